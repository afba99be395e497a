use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vigil_alert::{
    AlertEngine, Condition, PerformanceMetric, PerformanceRule, PerformanceSnapshot, Rule,
    Severity, StaticMetricsProvider,
};
use vigil_server::{
    api::{create_router, spawn_server},
    AppState,
};

async fn create_test_engine(error_rate: f64) -> Arc<AlertEngine> {
    let provider = Arc::new(StaticMetricsProvider::new());
    provider
        .set_performance(PerformanceSnapshot::new().with(PerformanceMetric::ErrorRate, error_rate))
        .await;

    let engine = AlertEngine::builder()
        .with_performance_provider(provider)
        .build()
        .unwrap();
    engine
        .add_rule(Rule::Performance(PerformanceRule {
            id: "error-rate".to_string(),
            name: "High Error Rate".to_string(),
            metric: PerformanceMetric::ErrorRate,
            condition: Condition::Gt,
            threshold: 5.0,
            sustained_duration_minutes: 0,
            severity: Severity::Critical,
            cooldown_minutes: 10,
            enabled: true,
        }))
        .await
        .unwrap();
    Arc::new(engine)
}

fn router(engine: &Arc<AlertEngine>) -> Router {
    create_router(AppState::new(Arc::clone(engine)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let engine = create_test_engine(1.0).await;
    let (status, body) = send(router(&engine), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_active_alerts_after_cycle() {
    let engine = create_test_engine(12.0).await;
    engine.run_cycle().await;

    let (status, body) = send(router(&engine), get("/api/v1/alerts/active")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["rule_id"], "error-rate");
    assert_eq!(body["alerts"][0]["severity"], "critical");
}

#[tokio::test]
async fn test_acknowledge_and_resolve() {
    let engine = create_test_engine(12.0).await;
    let report = engine.run_cycle().await;
    let alert_id = report.triggered[0].id.clone();

    let (status, _) = send(
        router(&engine),
        json_request(
            "POST",
            &format!("/api/v1/alerts/{alert_id}/acknowledge"),
            json!({ "by": "alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        engine.get_active_alerts().await[0].acknowledged_by.as_deref(),
        Some("alice")
    );

    let resolve = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/alerts/{alert_id}/resolve"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(&engine), resolve).await;
    assert_eq!(status, StatusCode::OK);
    assert!(engine.get_active_alerts().await.is_empty());

    let (status, body) = send(
        router(&engine),
        json_request(
            "POST",
            &format!("/api/v1/alerts/{alert_id}/resolve"),
            json!({ "by": "bob" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, body) = send(router(&engine), get("/api/v1/alerts/history?hours=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 1);
    assert_eq!(body["count"], 1);
    assert!(body["alerts"][0]["resolved_at"].is_string());
}

#[tokio::test]
async fn test_acknowledge_requires_actor() {
    let engine = create_test_engine(12.0).await;
    let report = engine.run_cycle().await;
    let alert_id = report.triggered[0].id.clone();

    let (status, _) = send(
        router(&engine),
        json_request(
            "POST",
            &format!("/api/v1/alerts/{alert_id}/acknowledge"),
            json!({ "by": "  " }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rule_lifecycle() {
    let engine = create_test_engine(1.0).await;

    let new_rule = json!({
        "kind": "business",
        "id": "churn",
        "name": "Churn spike",
        "metric": "revenue.churnRate",
        "condition": "gt",
        "threshold": 5.0,
        "comparison_period": "month",
        "severity": "high"
    });
    let (status, body) = send(router(&engine), json_request("POST", "/api/v1/rules", new_rule.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], "churn");

    let (status, _) = send(router(&engine), json_request("POST", "/api/v1/rules", new_rule)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        router(&engine),
        json_request("PATCH", "/api/v1/rules/churn", json!({ "threshold": 7.5, "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rule"]["threshold"], 7.5);
    assert_eq!(body["rule"]["enabled"], false);

    let (status, _) = send(
        router(&engine),
        json_request("PATCH", "/api/v1/rules/error-rate", json!({ "threshold": 250.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(router(&engine), get("/api/v1/rules")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/v1/rules/churn")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(&engine), delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let delete = Request::builder()
        .method("DELETE")
        .uri("/api/v1/rules/churn")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router(&engine), delete).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_invalid_rule_rejected() {
    let engine = create_test_engine(1.0).await;
    let (status, body) = send(
        router(&engine),
        json_request(
            "POST",
            "/api/v1/rules",
            json!({
                "kind": "performance",
                "id": "cpu",
                "name": "CPU",
                "metric": "cpu",
                "condition": "gt",
                "threshold": 140.0,
                "severity": "high"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cpu"));
}

#[tokio::test]
async fn test_evaluate_analytics_and_metrics() {
    let engine = create_test_engine(12.0).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/evaluate")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router(&engine), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["triggered"].as_array().unwrap().len(), 1);

    let (status, body) = send(router(&engine), get("/api/v1/analytics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["active"], 1);

    let (status, body) = send(router(&engine), get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("vigil_alerts_triggered_total"));
}

#[tokio::test]
async fn test_spawn_server_fails_when_address_taken() {
    let engine = create_test_engine(1.0).await;
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();

    let result = spawn_server(addr, AppState::new(engine), std::future::pending::<()>());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("failed to bind"));
}

#[tokio::test]
async fn test_spawn_server_stops_on_shutdown() {
    let engine = create_test_engine(1.0).await;
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = spawn_server(
        "127.0.0.1:0".parse().unwrap(),
        AppState::new(engine),
        async move {
            let _ = rx.await;
        },
    )
    .unwrap();

    tx.send(()).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
