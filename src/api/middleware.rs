use super::response::RequestTimer;
use super::AppState;
use crate::utils::error::NavError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

fn timer_of(req: &Request) -> RequestTimer {
    req.extensions()
        .get::<RequestTimer>()
        .copied()
        .unwrap_or_else(RequestTimer::start)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 限流 key：代理轉送的來源 IP，其次是 API key，最後共用一個匿名桶
fn client_key(headers: &HeaderMap) -> String {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return format!("ip:{}", ip);
    }
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return format!("key:{}", key);
    }
    "anonymous".to_string()
}

/// 記錄每個請求並提供計時器給 handler
pub async fn track_request(mut req: Request, next: Next) -> Response {
    let timer = RequestTimer::start();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(timer);

    let response = next.run(req).await;
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = timer.elapsed_ms(),
        "📡 Request handled"
    );
    response
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let key = client_key(req.headers());
    let decision = state.limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, "⚠️ Rate limit exceeded");
        return timer_of(&req).error(&NavError::RateLimited {
            retry_after_secs: decision.reset_secs.max(1),
        });
    }

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        response.headers_mut().insert("x-ratelimit-remaining", value);
    }
    response
}

/// 驗證 bearer JWT，成功後把 claims 放進 extensions
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let timer = timer_of(&req);
    let Some(token) = bearer_token(req.headers()).map(str::to_string) else {
        return timer.error(&NavError::AuthError {
            message: "missing bearer token".to_string(),
        });
    };

    match state.jwt.verify(&token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => timer.error(&e),
    }
}
