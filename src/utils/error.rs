use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Token error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{provider} request failed (status {status}): {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Report '{report}' could not be read: {message}")]
    ReportFormatError { report: String, message: String },

    #[error("Analyzer '{analyzer}' failed: {message}")]
    AnalyzerError { analyzer: String, message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Auth,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl NavError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NavError::ConfigError { .. }
            | NavError::MissingConfigError { .. }
            | NavError::InvalidConfigValueError { .. }
            | NavError::TomlError(_) => ErrorCategory::Configuration,
            NavError::HttpError(_)
            | NavError::ProviderError { .. }
            | NavError::RateLimited { .. } => ErrorCategory::Network,
            NavError::CsvError(_)
            | NavError::SerializationError(_)
            | NavError::ReportFormatError { .. }
            | NavError::AnalyzerError { .. }
            | NavError::ValidationError { .. }
            | NavError::NotFound { .. }
            | NavError::ProcessingError { .. } => ErrorCategory::Data,
            NavError::JwtError(_) | NavError::AuthError { .. } | NavError::Forbidden { .. } => {
                ErrorCategory::Auth
            }
            NavError::ZipError(_) | NavError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        if self.is_retryable() {
            return ErrorSeverity::Medium;
        }
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Auth => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Data => match self {
                NavError::NotFound { .. } | NavError::ValidationError { .. } => ErrorSeverity::Low,
                _ => ErrorSeverity::High,
            },
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 暫時性錯誤（429、5xx、連線逾時）可重試
    pub fn is_retryable(&self) -> bool {
        match self {
            NavError::RateLimited { .. } => true,
            NavError::ProviderError { status, .. } => *status == 429 || *status >= 500,
            NavError::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            NavError::ConfigError { .. }
            | NavError::MissingConfigError { .. }
            | NavError::InvalidConfigValueError { .. }
            | NavError::TomlError(_) => "Check the configuration file and environment variables",
            NavError::HttpError(_) => "Check network connectivity and the provider endpoint",
            NavError::ProviderError { status, .. } if *status == 401 || *status == 403 => {
                "Refresh the access token and verify the developer token / MCC id"
            }
            NavError::ProviderError { .. } => "Retry later; the data provider reported an error",
            NavError::RateLimited { .. } => "Wait for the rate limit window to reset and retry",
            NavError::ReportFormatError { .. } | NavError::CsvError(_) => {
                "Re-export the report from Google Ads with column headers included"
            }
            NavError::AnalyzerError { .. } => "Inspect the analyzer input data for this date range",
            NavError::ValidationError { .. } => "Correct the request parameters",
            NavError::NotFound { .. } => "Verify the identifier and that the resource exists",
            NavError::JwtError(_) | NavError::AuthError { .. } => "Request a new access token",
            NavError::Forbidden { .. } => "Request a token that carries the required scope",
            NavError::SerializationError(_) | NavError::ProcessingError { .. } => {
                "Check the input data format"
            }
            NavError::ZipError(_) | NavError::IoError(_) => {
                "Check disk space and write permissions of the output location"
            }
        }
    }

    /// 對外訊息：系統層錯誤不洩漏內部細節
    pub fn user_friendly_message(&self) -> String {
        match self {
            NavError::ZipError(_) | NavError::IoError(_) => {
                "An internal error occurred while writing results".to_string()
            }
            NavError::HttpError(_) => "The data provider could not be reached".to_string(),
            NavError::ProviderError { provider, status, .. } => {
                format!("{} returned an error (status {})", provider, status)
            }
            NavError::JwtError(_) => "Invalid or expired access token".to_string(),
            NavError::SerializationError(_) => "Malformed data was received".to_string(),
            other => other.to_string(),
        }
    }

    /// CLI 結束碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        NavError::ValidationError {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        NavError::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_drives_retry_and_severity() {
        let throttled = NavError::ProviderError {
            provider: "google_ads".to_string(),
            status: 429,
            message: "RESOURCE_EXHAUSTED".to_string(),
        };
        assert!(throttled.is_retryable());
        assert_eq!(throttled.severity(), ErrorSeverity::Medium);
        assert_eq!(throttled.exit_code(), 2);

        let denied = NavError::ProviderError {
            provider: "google_ads".to_string(),
            status: 403,
            message: "PERMISSION_DENIED".to_string(),
        };
        assert!(!denied.is_retryable());
        assert_eq!(denied.severity(), ErrorSeverity::High);
        assert!(denied.recovery_suggestion().contains("access token"));
    }

    #[test]
    fn test_io_errors_are_opaque_to_users() {
        let err = NavError::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "/var/secret/path",
        ));
        assert_eq!(err.category(), ErrorCategory::System);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.user_friendly_message().contains("/var/secret/path"));
    }

    #[test]
    fn test_not_found_is_low_severity() {
        let err = NavError::not_found("Audit", "abc");
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.to_string(), "Audit not found: abc");
    }
}
