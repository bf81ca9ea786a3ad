//! Platform event handling.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Decoding of webhook deliveries and feed entries into [`PlatformEvent`]

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{PlatformEvent, PullRequestEvent};
pub use parser::{DecodeError, FeedEvent, parse_feed_event, parse_webhook};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, verify_signature,
};
