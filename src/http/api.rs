//! Axum handlers for `/api/*` routes.
//!
//! Each handler receives [`AppState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Errors are `{ "error": code, "message": … }`.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::llm::GenerationParams;
use crate::playground::types::Summary;
use crate::playground::{
    ComparisonMetrics, ModelResult, Rating, StoreError, StoredTest, TestRequest,
    compute_metrics_with,
};

use super::AppState;

// ── Request / response types ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RatingRequest {
    model_name: String,
    rating: u8,
}

/// A stored test plus freshly computed metrics.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestResponse<'a> {
    test_id: Uuid,
    created_at: DateTime<Utc>,
    prompt_text: &'a str,
    parameters: &'a GenerationParams,
    results: &'a [ModelResult],
    total_cost: &'a str,
    summary: &'a Summary,
    metrics: Option<ComparisonMetrics>,
    /// Set on creation when the store writes to disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    persisted: Option<bool>,
}

impl<'a> TestResponse<'a> {
    fn new(test: &'a StoredTest, state: &AppState) -> Self {
        Self {
            test_id: test.id,
            created_at: test.created_at,
            prompt_text: &test.prompt_text,
            parameters: &test.parameters,
            results: &test.outcome.results,
            total_cost: &test.outcome.total_cost,
            summary: &test.outcome.summary,
            metrics: compute_metrics_with(&test.outcome.results, state.metrics),
            persisted: None,
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn invalid_request(msg: impl std::fmt::Display) -> Response {
    (StatusCode::BAD_REQUEST, json_error("invalid_request", msg)).into_response()
}

fn parse_test_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|_| invalid_request(format!("invalid test id: {raw}")))
}

fn store_error(e: StoreError) -> Response {
    match e {
        StoreError::TestNotFound(_) | StoreError::ModelNotFound { .. } => {
            (StatusCode::NOT_FOUND, json_error("not_found", e)).into_response()
        }
        StoreError::FailedResult(_) => (StatusCode::CONFLICT, json_error("conflict", e)).into_response(),
        StoreError::Io(_) => {
            error!(error = %e, "test store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let body = json!({
        "status": "ok",
        "provider": state.runner.provider_name(),
        "tests": state.store.len().await,
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/models — short names the resolver accepts, with their backend ids.
pub(super) async fn models(State(state): State<AppState>) -> Response {
    let models: Vec<_> = state
        .runner
        .resolver()
        .supported_models()
        .map(|(name, id)| json!({ "name": name, "id": id }))
        .collect();
    (StatusCode::OK, Json(json!({ "models": models }))).into_response()
}

/// GET /api/pricing — current pricing table, per 1000 tokens.
pub(super) async fn pricing(State(state): State<AppState>) -> Response {
    let table = state.runner.pricing().get_pricing().await;
    (StatusCode::OK, Json(json!({ "pricing": &*table }))).into_response()
}

/// POST /api/playground/tests — run a prompt against every requested model.
///
/// A batch where some or all models failed is still 200; the failures are in
/// `results`. So is a batch the store could not write to disk: it is kept in
/// memory and the body carries `"persisted": false`.
pub(super) async fn create_test(
    State(state): State<AppState>,
    body: Result<Json<TestRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_request(rejection.body_text()),
    };
    if let Err(e) = req.validate() {
        debug!(error = %e, "rejected playground request");
        return invalid_request(e);
    }

    let outcome = state
        .runner
        .run_batch(&req.models, &req.prompt_text, &req.parameters, req.options)
        .await;
    let test = StoredTest::new(&req, outcome);

    let written = match state.store.insert(test.clone()).await {
        Ok(()) => true,
        Err(e) => {
            warn!(test_id = %test.id, error = %e, "test kept in memory only");
            false
        }
    };
    let mut body = TestResponse::new(&test, &state);
    body.persisted = state.store.is_persistent().then_some(written);
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/playground/tests/{test_id}
pub(super) async fn get_test(State(state): State<AppState>, Path(test_id): Path<String>) -> Response {
    let id = match parse_test_id(&test_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.store.get(id).await {
        Some(test) => (StatusCode::OK, Json(TestResponse::new(&test, &state))).into_response(),
        None => store_error(StoreError::TestNotFound(id)),
    }
}

/// POST /api/playground/tests/{test_id}/ratings — rate one model's result.
///
/// Returns the updated test with metrics recomputed.
pub(super) async fn rate_model(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    body: Result<Json<RatingRequest>, JsonRejection>,
) -> Response {
    let id = match parse_test_id(&test_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(req) = match body {
        Ok(b) => b,
        Err(rejection) => return invalid_request(rejection.body_text()),
    };
    let rating = match Rating::try_from(req.rating) {
        Ok(r) => r,
        Err(e) => return invalid_request(e),
    };

    match state.store.attach_rating(id, &req.model_name, rating, Utc::now()).await {
        Ok(test) => (StatusCode::OK, Json(TestResponse::new(&test, &state))).into_response(),
        Err(e) => {
            warn!(test_id = %id, model = %req.model_name, error = %e, "rating rejected");
            store_error(e)
        }
    }
}
