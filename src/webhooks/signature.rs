//! Webhook signature verification using HMAC-SHA256.
//!
//! The platform signs each delivery with the shared webhook secret and sends
//! the result in `X-Hub-Signature-256` as `sha256=<hex>`. Verification runs
//! before the body is parsed.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parses a signature header (`sha256=<hex>`) into raw bytes.
///
/// Returns `None` for a missing prefix, another algorithm, or bad hex.
///
/// # Examples
///
/// ```
/// use pr_mirror::webhooks::parse_signature_header;
///
/// assert_eq!(parse_signature_header("sha256=00ff"), Some(vec![0x00, 0xff]));
/// assert!(parse_signature_header("sha1=00ff").is_none());
/// assert!(parse_signature_header("sha256=zz").is_none());
/// ```
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a delivery's signature header against its body.
///
/// Comparison is constant-time. A malformed header is simply a failed
/// verification.
///
/// # Examples
///
/// ```
/// use pr_mirror::webhooks::{compute_signature, format_signature_header, verify_signature};
///
/// let header = format_signature_header(&compute_signature(b"{}", b"s3cret"));
/// assert!(verify_signature(b"{}", &header, b"s3cret"));
/// assert!(!verify_signature(b"{}", &header, b"other"));
/// ```
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Some(expected) = parse_signature_header(signature_header) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
