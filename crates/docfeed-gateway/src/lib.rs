//! docfeed HTTP gateway.
//!
//! This crate exposes a document collection over a small REST API and streams
//! live changes to any collection as newline-delimited JSON.

pub mod config;
pub mod error;
pub mod routes;
pub mod stream;

pub use config::{Args, GatewayConfig};
pub use error::AppError;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use docfeed_core::DocumentStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Document store shared by every handler and stream session.
    pub store: Arc<DocumentStore>,
    /// Gateway configuration.
    pub config: GatewayConfig,
    next_session_id: Arc<AtomicU64>,
    active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: DocumentStore, config: GatewayConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
            next_session_id: Arc::new(AtomicU64::new(1)),
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Allocate an id for a new stream session.
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of stream sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }

    /// Count a running session until the returned guard is dropped.
    pub fn track_session(&self) -> SessionGuard {
        self.active_sessions.fetch_add(1, Ordering::SeqCst);
        SessionGuard {
            active: self.active_sessions.clone(),
        }
    }
}

/// Keeps a stream session counted as active.
pub struct SessionGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::documents::routes())
        .merge(routes::changes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
