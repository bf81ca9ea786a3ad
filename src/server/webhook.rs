//! Webhook endpoint handler.
//!
//! Verifies the delivery signature, decodes the payload and mirrors merged
//! pull requests inline. Webhook deliveries are not checked against the
//! seen-event set; the mirrorer's mapping check is their only dedup.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::github::PlatformClient;
use crate::mirror::{MirrorError, MirrorTool};
use crate::store::EventStore;
use crate::webhooks::{DecodeError, parse_webhook, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Missing or invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Payload could not be decoded.
    #[error("invalid payload: {0}")]
    Decode(#[from] DecodeError),

    /// The mirror attempt failed.
    #[error("{0}")]
    Mirror(#[from] MirrorError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::Decode(_) => StatusCode::BAD_REQUEST,
            WebhookError::Mirror(MirrorError::AlreadyMirrored { .. }) => {
                return (StatusCode::OK, "Already mirrored").into_response();
            }
            WebhookError::Mirror(MirrorError::PlatformCreateFailed { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            WebhookError::Mirror(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: mirrored, ignored (filtered or not a pull request event), or
///   already mirrored
/// - 400 Bad Request: missing `X-GitHub-Event` or undecodable payload
/// - 401 Unauthorized: missing or invalid signature
/// - 500 Internal Server Error: merge tool or store failure
/// - 502 Bad Gateway: the downstream pull request could not be opened
///
/// # Example
///
/// ```ignore
/// POST /webhook HTTP/1.1
/// X-GitHub-Event: pull_request
/// X-GitHub-Delivery: 550e8400-e29b-41d4-a716-446655440000
/// X-Hub-Signature-256: sha256=...
///
/// {"action": "closed", "pull_request": {"merged": true, ...}}
///
/// HTTP/1.1 200 OK
///
/// Mirrored as #1234
/// ```
pub async fn webhook_handler<P, T, S>(
    State(app_state): State<AppState<P, T, S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), WebhookError>
where
    P: PlatformClient + 'static,
    T: MirrorTool + 'static,
    S: EventStore + 'static,
{
    let delivery_id = get_header(&headers, HEADER_DELIVERY).unwrap_or_default();

    // Nothing is parsed before the signature checks out.
    let signature_header =
        get_header(&headers, HEADER_SIGNATURE).map_err(|_| WebhookError::InvalidSignature)?;
    if !verify_signature(&body, &signature_header, app_state.webhook_secret()) {
        warn!(delivery_id = %delivery_id, "Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event_type = get_header(&headers, HEADER_EVENT)?;
    debug!(delivery_id = %delivery_id, event_type = %event_type, "Received webhook");

    let event = parse_webhook(&event_type, &body).inspect_err(|e| {
        warn!(delivery_id = %delivery_id, error = %e, "Undecodable webhook payload");
    })?;

    let pr = match app_state.filter().normalize(event, None) {
        Ok(pr) => pr,
        Err(reason) => {
            debug!(delivery_id = %delivery_id, reason = %reason, "Ignoring webhook");
            return Ok((StatusCode::OK, format!("Ignored: {reason}")));
        }
    };

    let result = app_state.mirrorer().mirror_pull_request(&pr).await?;
    info!(
        delivery_id = %delivery_id,
        pr = %result.upstream,
        downstream = %result.downstream,
        "Webhook mirrored upstream PR"
    );

    Ok((StatusCode::OK, format!("Mirrored as {}", result.downstream)))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
