#![cfg(feature = "server")]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use paid_search_nav::adapters::mock_provider::MockProvider;
use paid_search_nav::api::{create_router, AppState};
use paid_search_nav::domain::ports::DataProvider;
use paid_search_nav::security::JwtManager;
use paid_search_nav::{AuditService, LocalStorage, NavConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "an-api-test-secret-with-enough-bytes";
const API_KEY: &str = "test-key-1";

fn app(output: &TempDir, rate_limit_per_minute: u32) -> Router {
    let mut config = NavConfig::default();
    config.api.api_keys = vec![API_KEY.to_string()];
    config.api.rate_limit_per_minute = rate_limit_per_minute;

    let provider: Arc<dyn DataProvider> = Arc::new(MockProvider::new());
    let storage = LocalStorage::new(output.path().to_string_lossy().to_string());
    let service = AuditService::from_config(provider, storage, &config);
    let jwt = JwtManager::new(SECRET, &config.api.jwt_issuer, 3600).unwrap();

    create_router(AppState::new(service, jwt, &config))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value, Response<()>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (parts.status, value, Response::from_parts(parts, ()))
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn issue_token(app: &Router) -> String {
    let request = Request::post("/v1/auth/token")
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"]["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);

    let (status, body, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["analyzers"], 7);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);

    let (status, body, _) =
        send(&app, Request::get("/v1/analyzers").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _, _) = send(&app, get("/v1/analyzers", "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let bad_key = Request::post("/v1/auth/token")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, bad_key).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_customer_and_audit_flow() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);
    let token = issue_token(&app).await;

    let (status, _, _) = send(
        &app,
        post_json(
            "/v1/customers",
            &token,
            json!({ "customer_id": "123-456-7890", "name": "Acme Shoes" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = send(&app, get("/v1/customers/1234567890", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Acme Shoes");

    let (status, body, _) = send(
        &app,
        post_json(
            "/v1/audits",
            &token,
            json!({
                "customer_id": "1234567890",
                "start_date": "2026-01-01",
                "end_date": "2026-01-31",
                "analyzers": ["search_terms", "geo_performance"]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "completed");
    let audit_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body, _) = send(&app, get(&format!("/v1/audits/{}", audit_id), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], audit_id.as_str());

    let (status, body, _) = send(
        &app,
        get(
            &format!("/v1/audits/{}/recommendations?per_page=5&analyzer=search_terms", audit_id),
            &token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["per_page"], 5);
    for item in body["data"]["items"].as_array().unwrap() {
        assert_eq!(item["analyzer"], "search_terms");
    }

    let (status, body, _) = send(&app, get("/v1/customers/1234567890/audits", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_requests_map_to_client_errors() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);
    let token = issue_token(&app).await;

    let (status, body, _) = send(
        &app,
        post_json("/v1/audits", &token, json!({ "customer_id": "12345" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _, _) = send(&app, get("/v1/audits/not-a-uuid", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = uuid::Uuid::new_v4();
    let (status, body, _) = send(&app, get(&format!("/v1/audits/{}", missing), &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _, _) = send(&app, get("/v1/customers/9999999999", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);
    let token = issue_token(&app).await;

    let (status, _, _) = send(&app, get("/v1/analyzers", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = send(&app, post_json("/v1/auth/revoke", &token, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revoked"], true);

    let (status, _, _) = send(&app, get("/v1/analyzers", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rate_limit_returns_retry_after() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 2);

    let token = issue_token(&app).await;
    let request = || {
        let mut request = get("/v1/analyzers", &token);
        request
            .headers_mut()
            .insert("x-api-key", API_KEY.parse().unwrap());
        request
    };

    // 第一個額度已被簽發權杖用掉
    let (status, _, response) = send(&app, request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    let (status, body, response) = send(&app, request()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // /health 不受限流影響
    let (status, _, _) = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_write_routes_require_write_scope() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);
    let jwt = JwtManager::new(SECRET, &NavConfig::default().api.jwt_issuer, 3600).unwrap();
    let read_only = jwt.issue("read-only", &["audits:read".to_string()]).unwrap().token;

    let (status, _, _) = send(&app, get("/v1/analyzers", &read_only)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = send(
        &app,
        post_json("/v1/audits", &read_only, json!({ "customer_id": "1234567890", "days": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _, _) = send(
        &app,
        post_json(
            "/v1/customers",
            &read_only,
            json!({ "customer_id": "1234567890", "name": "Acme Shoes" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 沒有任何 scope 的權杖也不能讀
    let no_scope = jwt.issue("nobody", &[]).unwrap().token;
    let (status, _, _) = send(&app, get("/v1/customers/1234567890/audits", &no_scope)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 稽核未執行
    let full = issue_token(&app).await;
    let (status, body, _) = send(&app, get("/v1/customers/1234567890/audits", &full)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_days_is_rejected() {
    let output = TempDir::new().unwrap();
    let app = app(&output, 100);
    let token = issue_token(&app).await;

    for days in [731_u64, 4_294_967_295] {
        let (status, body, _) = send(
            &app,
            post_json("/v1/audits", &token, json!({ "customer_id": "1234567890", "days": days })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
