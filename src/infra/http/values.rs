use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::application::{error::HttpError, values::ValuesService};

use super::{
    health_response,
    middleware::{catch_panics, log_responses, set_request_context},
};

const SOURCE: &str = "infra::http::values";

#[derive(Clone)]
pub struct HttpState {
    pub values: Arc<ValuesService>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(greeting))
        .route("/values/all", get(list_all_values))
        .route("/values/current", get(current_values))
        .route("/values", post(submit_value))
        .route("/_health/db", get(db_health))
        .route("/_health/cache", get(cache_health))
        .with_state(state)
        .layer(middleware::from_fn(catch_panics))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Serialize)]
struct Working {
    working: bool,
}

async fn greeting() -> &'static str {
    "Hi"
}

async fn list_all_values(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let rows = state.values.list_durable().await?;
    Ok(Json(rows).into_response())
}

async fn current_values(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let snapshot = state.values.snapshot_cache().await?;
    Ok(Json(snapshot).into_response())
}

async fn submit_value(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let raw = index_field(&body)?;
    state.values.submit(raw.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(Working { working: true })))
}

async fn db_health(State(state): State<HttpState>) -> Response {
    health_response("infra::http::db_health", state.values.durable_health().await)
}

async fn cache_health(State(state): State<HttpState>) -> Response {
    health_response("infra::http::cache_health", state.values.cache_health().await)
}

/// Extract the `index` field from a request body.
///
/// Empty bodies and JSON documents that are not objects carry no field; only a
/// body that fails to parse as JSON is malformed.
fn index_field(body: &[u8]) -> Result<Option<Value>, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let document: Value = serde_json::from_slice(body).map_err(|err| {
        HttpError::from_error(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "malformed request body",
            &err,
        )
    })?;

    Ok(match document {
        Value::Object(mut fields) => fields.remove("index"),
        _ => None,
    })
}
