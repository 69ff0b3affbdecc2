//! HTTP API tests — the real router driven with `tower::ServiceExt::oneshot`,
//! backed by the offline echo provider and the static pricing table.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use promptlab::config::load_from;
use promptlab::http::{AppState, build_router};

fn offline_state(dir: &tempfile::TempDir, persist: bool) -> AppState {
    let path = dir.path().join("offline.toml");
    let toml = format!(
        r#"
[server]
work_dir = "{work_dir}"
log_level = "warn"

[llm]
default = "dummy"

[playground]
concurrency = 2
timeout_ms = 2000
persist = {persist}

[pricing]
source = "static"

[models.aliases]
house-model = "acme/house-v1"
"#,
        work_dir = dir.path().display(),
    );
    std::fs::write(&path, toml).unwrap();
    let cfg = load_from(&path, None, None).unwrap();
    AppState::from_config(&cfg).unwrap()
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn run_request() -> Value {
    json!({
        "promptText": "Explain ownership",
        "models": ["gpt-4o", "gpt-9000", "house-model", "claude-3-haiku"],
        "parameters": { "temperature": 0.3, "maxTokens": 64, "topP": 0.9 }
    })
}

#[tokio::test]
async fn test_health_models_pricing() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let (status, body) = call(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "dummy");

    let (status, body) = call(&app, "GET", "/api/models", None).await;
    assert_eq!(status, StatusCode::OK);
    let models = body["models"].as_array().unwrap();
    assert!(models.iter().any(|m| m["name"] == "house-model" && m["id"] == "acme/house-v1"));
    assert!(models.iter().any(|m| m["name"] == "gpt-4o" && m["id"] == "openai/gpt-4o"));

    let (status, body) = call(&app, "GET", "/api/pricing", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pricing"]["openai/gpt-4o"]["prompt"], 0.0025);
}

#[tokio::test]
async fn test_create_test_returns_ordered_results_and_metrics() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let (status, body) = call(&app, "POST", "/api/playground/tests", Some(run_request())).await;
    assert_eq!(status, StatusCode::OK);

    let results = body["results"].as_array().unwrap();
    let order: Vec<&str> = results.iter().map(|r| r["model"].as_str().unwrap()).collect();
    assert_eq!(order, ["gpt-4o", "gpt-9000", "house-model", "claude-3-haiku"]);

    assert_eq!(results[0]["response"], "[echo:openai/gpt-4o] Explain ownership");
    assert!(results[0].get("error").is_none());
    assert_eq!(results[1]["error"], "unsupported model: gpt-9000");
    assert_eq!(results[1]["cost"], "0.00");
    // No pricing for the alias target.
    assert_eq!(results[2]["cost"], "0.00");

    assert_eq!(body["summary"]["successful"], 3);
    assert_eq!(body["summary"]["failed"], 1);
    assert!(body["testId"].is_string());
    assert!(body["totalCost"].is_string());
    assert!(body.get("persisted").is_none());

    let metrics = &body["metrics"];
    assert!(metrics.is_object());
    // Nothing rated yet: quality falls back to the first success.
    assert_eq!(metrics["winners"]["quality"], "gpt-4o");
    assert!(metrics["averageRating"].is_null());
}

#[tokio::test]
async fn test_all_failed_batch_has_null_metrics() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let req = json!({ "promptText": "Hi", "models": ["nope-1", "nope-2"] });
    let (status, body) = call(&app, "POST", "/api/playground/tests", Some(req)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["failed"], 2);
    assert!(body["metrics"].is_null());
}

#[tokio::test]
async fn test_invalid_requests_are_400() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let cases = [
        json!({ "promptText": "", "models": ["gpt-4o"] }),
        json!({ "promptText": "Hi", "models": [] }),
        json!({ "promptText": "Hi", "models": ["gpt-4o"], "parameters": { "temperature": 2.0 } }),
        json!({ "promptText": "Hi", "models": ["gpt-4o"], "parameters": { "maxTokens": 0 } }),
        json!({ "promptText": "Hi", "models": ["gpt-4o"], "options": { "concurrency": 0 } }),
        json!({ "models": ["gpt-4o"] }),
    ];
    for case in cases {
        let (status, body) = call(&app, "POST", "/api/playground/tests", Some(case.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert_eq!(body["error"], "invalid_request", "{case}");
        assert!(body["message"].is_string());
    }
}

#[tokio::test]
async fn test_rating_flow() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let (_, created) = call(&app, "POST", "/api/playground/tests", Some(run_request())).await;
    let id = created["testId"].as_str().unwrap().to_string();
    let ratings = format!("/api/playground/tests/{id}/ratings");

    let (status, body) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "claude-3-haiku", "rating": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][3]["rating"], 5);
    assert!(body["results"][3]["ratedAt"].is_string());
    assert_eq!(body["metrics"]["winners"]["quality"], "claude-3-haiku");
    assert_eq!(body["metrics"]["averageRating"], 5.0);

    let (_, body) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "gpt-4o", "rating": 2 }))).await;
    assert_eq!(body["metrics"]["averageRating"], 3.5);
    assert_eq!(body["metrics"]["winners"]["quality"], "claude-3-haiku");

    let (status, fetched) = call(&app, "GET", &format!("/api/playground/tests/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["results"][0]["rating"], 2);
    assert_eq!(fetched["promptText"], "Explain ownership");
}

#[tokio::test]
async fn test_rating_errors() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, false));

    let (_, created) = call(&app, "POST", "/api/playground/tests", Some(run_request())).await;
    let id = created["testId"].as_str().unwrap().to_string();
    let ratings = format!("/api/playground/tests/{id}/ratings");

    let (status, body) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "gpt-4o", "rating": 9 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "mistral-large", "rating": 3 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "gpt-9000", "rating": 3 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let unknown = "/api/playground/tests/00000000-0000-4000-8000-000000000000/ratings";
    let (status, _) =
        call(&app, "POST", unknown, Some(json!({ "modelName": "gpt-4o", "rating": 3 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, "GET", "/api/playground/tests/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_persisted_tests_survive_restart() {
    let tmp = tempfile::TempDir::new().unwrap();

    let id = {
        let app = build_router(offline_state(&tmp, true));
        let (_, created) = call(&app, "POST", "/api/playground/tests", Some(run_request())).await;
        assert_eq!(created["persisted"], true);
        let id = created["testId"].as_str().unwrap().to_string();
        let ratings = format!("/api/playground/tests/{id}/ratings");
        let (status, _) =
            call(&app, "POST", &ratings, Some(json!({ "modelName": "gpt-4o", "rating": 4 }))).await;
        assert_eq!(status, StatusCode::OK);
        id
    };
    assert!(tmp.path().join("tests").join(format!("{id}.json")).exists());

    let app = build_router(offline_state(&tmp, true));
    let (status, body) = call(&app, "GET", &format!("/api/playground/tests/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["rating"], 4);
    assert_eq!(body["metrics"]["winners"]["quality"], "gpt-4o");
}

#[tokio::test]
async fn test_unwritable_store_still_returns_the_batch() {
    let tmp = tempfile::TempDir::new().unwrap();
    let app = build_router(offline_state(&tmp, true));

    // Replace the tests dir with a plain file so every write fails.
    let tests_dir = tmp.path().join("tests");
    std::fs::remove_dir_all(&tests_dir).unwrap();
    std::fs::write(&tests_dir, "not a directory").unwrap();

    let (status, body) = call(&app, "POST", "/api/playground/tests", Some(run_request())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 4);
    assert_eq!(body["summary"]["successful"], 3);
    assert_eq!(body["persisted"], false);

    let id = body["testId"].as_str().unwrap().to_string();
    let (status, fetched) = call(&app, "GET", &format!("/api/playground/tests/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["promptText"], "Explain ownership");

    let ratings = format!("/api/playground/tests/{id}/ratings");
    let (status, rated) =
        call(&app, "POST", &ratings, Some(json!({ "modelName": "gpt-4o", "rating": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rated["results"][0]["rating"], 4);
}
