//! Realtime-database style REST surface.
//!
//! Paths carry a `.json` suffix on their last segment, as in
//! `GET /users.json` or `PUT /users/<key>.json`.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use shared::error::{ApiError, ErrorCode};
use tracing::{debug, error};

use crate::app_state::AppState;

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/:segment", get(get_collection))
        .route(
            "/:collection/:segment",
            get(get_entry).put(put_entry).delete(delete_entry),
        )
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.storage.health_check().await.map_err(internal)?;
    Ok("ok")
}

async fn get_collection(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> ApiResult<Json<Value>> {
    let collection = json_segment(&segment)?;
    let entries = state
        .storage
        .list_entries(collection)
        .await
        .map_err(internal)?;

    if entries.is_empty() {
        return Ok(Json(Value::Null));
    }
    Ok(Json(Value::Object(entries)))
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path((collection, segment)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let key = json_segment(&segment)?;
    let entry = state
        .storage
        .get_entry(&collection, key)
        .await
        .map_err(internal)?;
    Ok(Json(entry.unwrap_or(Value::Null)))
}

async fn put_entry(
    State(state): State<Arc<AppState>>,
    Path((collection, segment)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let key = json_segment(&segment)?;
    let value: Value = serde_json::from_slice(&body).map_err(|e| {
        validation(format!("request body is not valid json: {e}"))
    })?;

    // Writing null removes the entry.
    if value.is_null() {
        state
            .storage
            .delete_entry(&collection, key)
            .await
            .map_err(internal)?;
        return Ok(Json(Value::Null));
    }

    state
        .storage
        .put_entry(&collection, key, &value)
        .await
        .map_err(internal)?;
    debug!(%collection, %key, "entry written");
    Ok(Json(value))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path((collection, segment)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let key = json_segment(&segment)?;
    let removed = state
        .storage
        .delete_entry(&collection, key)
        .await
        .map_err(internal)?;
    debug!(%collection, %key, removed, "entry deleted");
    Ok(Json(Value::Null))
}

fn json_segment(segment: &str) -> ApiResult<&str> {
    match segment.strip_suffix(".json") {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(validation(format!(
            "path segment {segment:?} must be a non-empty name ending in .json"
        ))),
    }
}

fn validation(message: String) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

fn internal(err: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    error!(error = %err, "record store request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, err.to_string())),
    )
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
