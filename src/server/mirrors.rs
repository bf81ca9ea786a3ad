//! Read-only inspection of mirror bookkeeping.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppState;
use crate::github::PlatformClient;
use crate::mirror::MirrorTool;
use crate::store::{EventStore, MirrorRecord, StoreError};
use crate::types::PrNumber;

/// Errors from the inspection endpoints.
#[derive(Debug, Error)]
pub enum InspectError {
    #[error("upstream PR {0} has not been mirrored")]
    NotFound(PrNumber),

    #[error("event store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for InspectError {
    fn into_response(self) -> Response {
        let status = match &self {
            InspectError::NotFound(_) => StatusCode::NOT_FOUND,
            InspectError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

/// Body of `GET /api/v1/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub target_branch: String,
    pub mirrors: usize,
    pub seen_events: usize,
}

/// Mapping lookup handler.
///
/// # Response
///
/// - 200 OK with `{"upstream": 42, "downstream": 1234, "mirrored_at": "..."}`
/// - 404 Not Found if the upstream PR has no mapping
/// - 500 Internal Server Error if the store cannot be read
pub async fn mirror_handler<P, T, S>(
    State(app_state): State<AppState<P, T, S>>,
    Path(upstream): Path<u64>,
) -> Result<Json<MirrorRecord>, InspectError>
where
    P: PlatformClient + 'static,
    T: MirrorTool + 'static,
    S: EventStore + 'static,
{
    let upstream = PrNumber(upstream);
    app_state
        .mirrorer()
        .store()
        .mirror_record(upstream)?
        .map(Json)
        .ok_or(InspectError::NotFound(upstream))
}

/// Counts of recorded mirrors and seen feed events.
pub async fn status_handler<P, T, S>(
    State(app_state): State<AppState<P, T, S>>,
) -> Result<Json<StatusResponse>, InspectError>
where
    P: PlatformClient + 'static,
    T: MirrorTool + 'static,
    S: EventStore + 'static,
{
    let mirrorer = app_state.mirrorer();
    let store = mirrorer.store();
    Ok(Json(StatusResponse {
        target_branch: mirrorer.target_branch().to_string(),
        mirrors: store.mapping_count()?,
        seen_events: store.seen_count()?,
    }))
}
