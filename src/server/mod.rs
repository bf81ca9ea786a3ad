//! HTTP server for the PR mirror.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries and mirrors merged
//!   pull requests inline
//! - `GET /api/v1/mirrors/{upstream}` - Returns the mapping for an upstream PR
//! - `GET /api/v1/status` - Returns mirror and seen-event counts
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use tower_http::trace::TraceLayer;

use crate::filter::MergeFilter;
use crate::github::PlatformClient;
use crate::mirror::{MirrorTool, Mirrorer};
use crate::store::EventStore;

pub mod health;
pub mod mirrors;
pub mod webhook;

pub use health::health_handler;
pub use mirrors::{InspectError, StatusResponse, mirror_handler, status_handler};
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. The
/// [`Mirrorer`] is the same instance the poller uses, so both paths share
/// one gate and one store.
pub struct AppState<P, T, S> {
    inner: Arc<AppStateInner<P, T, S>>,
}

struct AppStateInner<P, T, S> {
    mirrorer: Arc<Mirrorer<P, T, S>>,
    filter: MergeFilter,
    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,
}

// Manual impl: the handle is cloneable whatever P, T and S are.
impl<P, T, S> Clone for AppState<P, T, S> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, T, S> AppState<P, T, S>
where
    P: PlatformClient,
    T: MirrorTool,
    S: EventStore,
{
    pub fn new(mirrorer: Arc<Mirrorer<P, T, S>>, webhook_secret: impl Into<Vec<u8>>) -> Self {
        let filter = MergeFilter::new(mirrorer.target_branch());
        AppState {
            inner: Arc::new(AppStateInner {
                mirrorer,
                filter,
                webhook_secret: webhook_secret.into(),
            }),
        }
    }

    pub fn mirrorer(&self) -> &Mirrorer<P, T, S> {
        &self.inner.mirrorer
    }

    pub fn filter(&self) -> &MergeFilter {
        &self.inner.filter
    }

    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<P, T, S>(app_state: AppState<P, T, S>) -> axum::Router
where
    P: PlatformClient + 'static,
    T: MirrorTool + 'static,
    S: EventStore + 'static,
{
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<P, T, S>))
        .route("/api/v1/mirrors/{upstream}", get(mirror_handler::<P, T, S>))
        .route("/api/v1/status", get(status_handler::<P, T, S>))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
