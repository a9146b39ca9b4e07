//! Change feed endpoint.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::AppError;
use crate::stream::{sink, StreamSession};
use crate::AppState;

/// Change feed routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/change/:table", get(handle_changefeed))
}

/// Stream every change to `table` as newline-delimited JSON until the client leaves.
async fn handle_changefeed(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let session = StreamSession::open(state.next_session_id(), &table, |name| store.changes(name))?;

    let (sink, body) = sink::response_channel();
    let guard = state.track_session();
    tokio::spawn(async move {
        session.run(sink).await;
        drop(guard);
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}
