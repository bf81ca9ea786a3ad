//! Mirroring of merged upstream pull requests.
//!
//! The [`Mirrorer`] is the only component that runs the merge tool or opens
//! downstream pull requests. Both event sources (poller and webhook) call
//! [`Mirrorer::mirror_pull_request`], which serializes attempts through its
//! [`MirrorGate`].

pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod render;
pub mod tool;

pub use error::MirrorError;
pub use gate::{GateGuard, MirrorGate};
pub use orchestrator::{MirrorResult, Mirrorer};
pub use tool::{MirrorTool, ScriptTool, ToolError, ToolOutput};
