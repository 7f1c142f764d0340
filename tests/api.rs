//! HTTP-level tests driving the axum router.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use shift_optimizer::api::{self, AppState};
use shift_optimizer::config::OptimizerConfig;

fn app() -> Router {
    api::router(Arc::new(AppState::default()))
}

fn uncached_app() -> Router {
    let mut config = OptimizerConfig::default();
    config.cache.capacity = 0;
    api::router(Arc::new(AppState::new(config)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

async fn optimize_raw(app: Router, body: impl Into<Body>) -> (StatusCode, Vec<u8>) {
    let request = Request::post("/api/optimize")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

async fn optimize(app: Router, body: &Value) -> Value {
    let (status, bytes) = optimize_raw(app, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&bytes).unwrap()
}

fn bartenders() -> Value {
    json!({
        "employees": [
            {"id": "alice", "name": "Alice", "abilities": ["bartender"]},
            {"id": "bob", "name": "Bob", "abilities": ["bartender"]}
        ],
        "shifts": [
            {"id": "s1", "name": "Wednesday Bar", "start_time": "2024-12-25T18:00:00",
             "end_time": "2024-12-25T23:00:00", "required_abilities": ["bartender"]},
            {"id": "s2", "name": "Thursday Bar", "start_time": "2024-12-26T18:00:00",
             "end_time": "2024-12-26T23:00:00", "required_abilities": ["bartender"]}
        ]
    })
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_info() {
    let (status, body) = get(app(), "/api/info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["solverEngine"].is_string());
}

#[tokio::test]
async fn test_balanced_bartenders() {
    let body = optimize(app(), &bartenders()).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["error"], Value::Null);
    let solutions = body["solutions"].as_array().unwrap();
    assert_eq!(solutions.len(), 1);

    let best = &solutions[0];
    assert_ne!(best["assignments"]["s1"], best["assignments"]["s2"]);
    assert_eq!(best["metrics"]["total_shifts_assigned"], 2);
    assert_eq!(best["metrics"]["fairness_score"].as_f64(), Some(1.0));
    assert_eq!(best["metrics"]["soft_preference_score"], 0);
}

#[tokio::test]
async fn test_several_solutions_best_first() {
    let mut request = bartenders();
    request["max_solutions"] = json!(3);
    let body = optimize(app(), &request).await;

    let solutions = body["solutions"].as_array().unwrap();
    assert!(!solutions.is_empty() && solutions.len() <= 3);
    let fairness: Vec<f64> = solutions
        .iter()
        .map(|s| s["metrics"]["fairness_score"].as_f64().unwrap())
        .collect();
    assert_eq!(fairness[0], 1.0);
    for pair in solutions.windows(2) {
        assert_ne!(pair[0]["assignments"], pair[1]["assignments"]);
    }
}

#[tokio::test]
async fn test_malformed_json_is_an_envelope() {
    let (status, bytes) = optimize_raw(app(), "{\"employees\": [").await;
    assert_eq!(status, StatusCode::OK);

    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["solutions"], json!([]));
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_unknown_shift_reference() {
    let mut request = bartenders();
    request["employees"][0]["preferences"] = json!([{"type": "prefer_shift", "shift_id": "s9"}]);
    let body = optimize(app(), &request).await;

    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("unknown shift_id 's9'"), "{}", error);
}

#[tokio::test]
async fn test_invalid_max_solutions() {
    let mut request = bartenders();
    request["max_solutions"] = json!(0);
    let body = optimize(app(), &request).await;

    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("max_solutions"));
}

#[tokio::test]
async fn test_conflicting_pins_are_infeasible() {
    let mut request = bartenders();
    request["employees"][0]["preferences"] = json!([{"type": "prefer_shift", "shift_id": "s1", "is_hard": true}]);
    request["employees"][1]["preferences"] = json!([{"type": "prefer_shift", "shift_id": "s1", "is_hard": true}]);
    let body = optimize(app(), &request).await;

    assert_eq!(body["success"], false);
    assert!(body["solutions"].as_array().unwrap().is_empty());
    assert!(body["error"].as_str().unwrap().starts_with("Infeasible"));
}

#[tokio::test]
async fn test_unstaffable_shift_stays_open() {
    let mut request = bartenders();
    request["shifts"].as_array_mut().unwrap().push(json!({
        "id": "s3", "name": "Kitchen", "start_time": "2024-12-27T08:00:00",
        "end_time": "2024-12-27T12:00:00", "required_abilities": ["chef"]
    }));
    let body = optimize(app(), &request).await;

    assert_eq!(body["success"], true);
    let best = &body["solutions"][0];
    assert!(best["assignments"].get("s3").is_none());
    assert_eq!(best["metrics"]["total_shifts_assigned"], 2);
}

#[tokio::test]
async fn test_unavailability_by_shift() {
    let mut request = bartenders();
    request["employees"][0]["preferences"] = json!([{"type": "unavailable_period", "shift_id": "s1"}]);
    let body = optimize(app(), &request).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["solutions"][0]["assignments"]["s1"], "bob");
    assert_eq!(body["solutions"][0]["assignments"]["s2"], "alice");
}

#[tokio::test]
async fn test_identical_requests_give_identical_bodies() {
    let mut request = bartenders();
    request["max_solutions"] = json!(4);
    let payload = request.to_string();

    let (_, first) = optimize_raw(uncached_app(), payload.clone()).await;
    let (_, second) = optimize_raw(uncached_app(), payload).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_demo_data() {
    let (status, body) = get(app(), "/api/demo-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["BAR", "LARGE"]));

    let (status, bar) = get(app(), "/api/demo-data/BAR").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bar["employees"].as_array().unwrap().len(), 4);

    let (status, _) = get(app(), "/api/demo-data/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let solved = optimize(app(), &bar).await;
    assert_eq!(solved["success"], true);
    let best = &solved["solutions"][0];
    assert_ne!(best["assignments"]["evening"], "carol");
}
