use crate::utils::error::{NavError, Result};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// 所有端點共用的回應外框
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub suggestion: String,
}

/// NavError → HTTP 狀態碼
pub fn status_for(error: &NavError) -> StatusCode {
    match error {
        NavError::ValidationError { .. } => StatusCode::BAD_REQUEST,
        NavError::NotFound { .. } => StatusCode::NOT_FOUND,
        NavError::AuthError { .. } | NavError::JwtError(_) => StatusCode::UNAUTHORIZED,
        NavError::Forbidden { .. } => StatusCode::FORBIDDEN,
        NavError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        NavError::ProviderError { .. } | NavError::HttpError(_) => StatusCode::BAD_GATEWAY,
        NavError::ReportFormatError { .. } | NavError::CsvError(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_code(error: &NavError) -> &'static str {
    match error {
        NavError::ValidationError { .. } => "VALIDATION_ERROR",
        NavError::NotFound { .. } => "NOT_FOUND",
        NavError::AuthError { .. } | NavError::JwtError(_) => "UNAUTHORIZED",
        NavError::Forbidden { .. } => "FORBIDDEN",
        NavError::RateLimited { .. } => "RATE_LIMITED",
        NavError::ProviderError { .. } | NavError::HttpError(_) => "PROVIDER_ERROR",
        NavError::ReportFormatError { .. } | NavError::CsvError(_) => "REPORT_FORMAT_ERROR",
        NavError::ConfigError { .. }
        | NavError::MissingConfigError { .. }
        | NavError::InvalidConfigValueError { .. }
        | NavError::TomlError(_) => "CONFIG_ERROR",
        _ => "INTERNAL_ERROR",
    }
}

/// 請求開始時間，由 `track_request` 放進 extensions
#[derive(Debug, Clone, Copy)]
pub struct RequestTimer {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn ok<T: Serialize>(&self, status: StatusCode, data: T) -> Response {
        let body = ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            latency_ms: self.elapsed_ms(),
            timestamp: self.started_at,
        };
        (status, Json(body)).into_response()
    }

    pub fn error(&self, error: &NavError) -> Response {
        let status = status_for(error);
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {} (Category: {:?})", error, error.category());
        } else {
            tracing::debug!("⚠️ Request rejected: {}", error);
        }

        let body: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code: error_code(error).to_string(),
                message: error.user_friendly_message(),
                suggestion: error.recovery_suggestion().to_string(),
            }),
            latency_ms: self.elapsed_ms(),
            timestamp: self.started_at,
        };
        let mut response = (status, Json(body)).into_response();

        if let NavError::RateLimited { retry_after_secs } = error {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }

    pub fn respond<T: Serialize>(&self, status: StatusCode, result: Result<T>) -> Response {
        match result {
            Ok(data) => self.ok(status, data),
            Err(e) => self.error(&e),
        }
    }
}
