//! Document CRUD endpoints.

use axum::body::Bytes;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use docfeed_core::{Document, DocumentStore};
use tracing::debug;

use crate::error::AppError;
use crate::AppState;

/// Document routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/get", get(handle_get_all))
        .route("/get/:name", get(handle_get))
        .route("/", post(handle_create))
        .route("/:name", put(handle_update).delete(handle_delete))
}

/// Decode a request body as a document.
///
/// Undecodable bodies are reported as server errors, not client errors.
fn decode(body: &[u8]) -> Result<Document, AppError> {
    Ok(serde_json::from_slice(body)?)
}

/// Run a store call against the CRUD collection on the blocking pool.
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&DocumentStore, &str) -> docfeed_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    let collection = state.config.collection.clone();
    let result = tokio::task::spawn_blocking(move || f(&store, &collection))
        .await
        .map_err(|e| AppError::Internal(format!("spawn_blocking join error: {}", e)))?;
    Ok(result?)
}

/// Handle get-one.
async fn handle_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Document>, AppError> {
    let doc = with_store(&state, move |store, collection| store.get(collection, &name)).await?;
    Ok(Json(doc))
}

/// Handle get-all.
async fn handle_get_all(State(state): State<AppState>) -> Result<Json<Vec<Document>>, AppError> {
    let docs = with_store(&state, |store, collection| store.list(collection)).await?;
    Ok(Json(docs))
}

/// Handle create.
async fn handle_create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, String), AppError> {
    let doc = decode(&body)?;
    if doc.name.is_empty() {
        return Err(AppError::BadRequest("must field: name".to_string()));
    }

    let result = with_store(&state, move |store, collection| store.insert(collection, doc)).await?;
    debug!(%result, "document created");
    Ok((StatusCode::CREATED, format!("result: {}", result)))
}

/// Handle update. Answers 205 Reset Content on success.
///
/// The document is selected by the body's `name`; the path segment is not used.
async fn handle_update(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, AppError> {
    let patch = decode(&body)?;
    let name = patch.name.clone();
    let result =
        with_store(&state, move |store, collection| store.update(collection, &patch)).await?;
    debug!(name = %name, %result, "document updated");
    Ok(StatusCode::RESET_CONTENT)
}

/// Handle delete.
async fn handle_delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let key = name.clone();
    let result = with_store(&state, move |store, collection| store.delete(collection, &key)).await?;
    debug!(name = %name, %result, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}
