use crate::config::thresholds::ThresholdConfig;
use crate::utils::error::{NavError, Result};
use crate::utils::validation::{
    normalize_customer_id, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    pub provider: ProviderConfig,
    pub audit: AuditConfig,
    pub thresholds: ThresholdConfig,
    pub export: ExportConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Csv,
    GoogleAds,
    Bigquery,
    Mock,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "csv" => Some(ProviderKind::Csv),
            "google_ads" | "googleads" | "ads" => Some(ProviderKind::GoogleAds),
            "bigquery" | "bq" => Some(ProviderKind::Bigquery),
            "mock" => Some(ProviderKind::Mock),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub csv: CsvSourceConfig,
    pub google_ads: Option<GoogleAdsConfig>,
    pub bigquery: Option<BigQueryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSourceConfig {
    /// 每個客戶一個子目錄：`{input_dir}/{customer_id}/search_terms.csv`，不存在時直接讀 `input_dir`
    pub input_dir: String,
}

impl Default for CsvSourceConfig {
    fn default() -> Self {
        Self {
            input_dir: "./reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleAdsConfig {
    pub endpoint: String,
    pub api_version: String,
    pub developer_token: String,
    /// OAuth2 access token（由外部流程取得）
    pub access_token: String,
    /// MCC 管理帳戶，送出為 `login-customer-id`
    pub login_customer_id: Option<String>,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub requests_per_second: f64,
    pub cache_ttl_seconds: u64,
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://googleads.googleapis.com".to_string(),
            api_version: "v17".to_string(),
            developer_token: String::new(),
            access_token: String::new(),
            login_customer_id: None,
            timeout_seconds: 60,
            retry_attempts: 3,
            retry_delay_ms: 500,
            requests_per_second: 5.0,
            cache_ttl_seconds: 900,
        }
    }
}

impl Validate for GoogleAdsConfig {
    fn validate(&self) -> Result<()> {
        validate_url("provider.google_ads.endpoint", &self.endpoint)?;
        validate_non_empty_string("provider.google_ads.api_version", &self.api_version)?;
        validate_non_empty_string("provider.google_ads.developer_token", &self.developer_token)?;
        validate_non_empty_string("provider.google_ads.access_token", &self.access_token)?;
        if let Some(mcc) = &self.login_customer_id {
            normalize_customer_id("provider.google_ads.login_customer_id", mcc)?;
        }
        validate_range("provider.google_ads.retry_attempts", self.retry_attempts, 0, 10)?;
        if self.requests_per_second <= 0.0 {
            return Err(NavError::InvalidConfigValueError {
                field: "provider.google_ads.requests_per_second".to_string(),
                value: self.requests_per_second.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQueryConfig {
    pub endpoint: String,
    pub project_id: String,
    /// Google Ads Data Transfer 匯入的資料集
    pub dataset: String,
    pub access_token: String,
    /// 單一查詢的計費上限（bytes）
    pub maximum_bytes_billed: u64,
    pub timeout_ms: u64,
    /// 執行前先 dry run 估算掃描量
    pub dry_run_first: bool,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            project_id: String::new(),
            dataset: String::new(),
            access_token: String::new(),
            maximum_bytes_billed: 10 * 1024 * 1024 * 1024,
            timeout_ms: 60_000,
            dry_run_first: false,
            retry_attempts: 3,
            retry_delay_ms: 500,
            cache_ttl_seconds: 900,
        }
    }
}

impl Validate for BigQueryConfig {
    fn validate(&self) -> Result<()> {
        validate_url("provider.bigquery.endpoint", &self.endpoint)?;
        validate_non_empty_string("provider.bigquery.project_id", &self.project_id)?;
        validate_non_empty_string("provider.bigquery.dataset", &self.dataset)?;
        validate_non_empty_string("provider.bigquery.access_token", &self.access_token)?;
        if self.maximum_bytes_billed == 0 {
            return Err(NavError::InvalidConfigValueError {
                field: "provider.bigquery.maximum_bytes_billed".to_string(),
                value: "0".to_string(),
                reason: "a billing cap is required".to_string(),
            });
        }
        // dataset 會直接組進 SQL
        if !self
            .dataset
            .chars()
            .chain(self.project_id.chars())
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(NavError::InvalidConfigValueError {
                field: "provider.bigquery.dataset".to_string(),
                value: format!("{}.{}", self.project_id, self.dataset),
                reason: "only letters, digits, '_' and '-' are allowed".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// 空白代表執行全部分析器
    pub analyzers: Vec<String>,
    pub concurrency: usize,
    pub locale: String,
    pub currency: String,
    pub default_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            analyzers: Vec::new(),
            concurrency: 4,
            locale: "en".to_string(),
            currency: "USD".to_string(),
            default_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_path: String,
    pub formats: Vec<String>,
    pub s3_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: "./output".to_string(),
            formats: vec!["json".to_string(), "csv".to_string()],
            s3_prefix: "paid-search-nav".to_string(),
        }
    }
}

pub const SUPPORTED_EXPORT_FORMATS: [&str; 3] = ["csv", "json", "zip"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
    pub jwt_secret: Option<String>,
    pub jwt_issuer: String,
    pub token_ttl_seconds: u64,
    pub rate_limit_per_minute: u32,
    pub api_keys: Vec<String>,
    pub blacklist_sweep_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            jwt_secret: None,
            jwt_issuer: "paid-search-nav".to_string(),
            token_ttl_seconds: 3600,
            rate_limit_per_minute: 120,
            api_keys: Vec::new(),
            blacklist_sweep_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl NavConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content)?;
        Ok(toml::from_str(&processed)?)
    }

    pub fn google_ads(&self) -> Result<&GoogleAdsConfig> {
        self.provider
            .google_ads
            .as_ref()
            .ok_or_else(|| NavError::MissingConfigError {
                field: "provider.google_ads".to_string(),
            })
    }

    pub fn bigquery(&self) -> Result<&BigQueryConfig> {
        self.provider
            .bigquery
            .as_ref()
            .ok_or_else(|| NavError::MissingConfigError {
                field: "provider.bigquery".to_string(),
            })
    }

    pub fn jwt_secret(&self) -> Result<&str> {
        self.api
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| NavError::MissingConfigError {
                field: "api.jwt_secret".to_string(),
            })
    }
}

/// 替換環境變數（例如 `${GOOGLE_ADS_DEVELOPER_TOKEN}`）；未設定者保留原字串
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| NavError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl Validate for NavConfig {
    fn validate(&self) -> Result<()> {
        match self.provider.kind {
            ProviderKind::Csv => {
                validate_path("provider.csv.input_dir", &self.provider.csv.input_dir)?
            }
            ProviderKind::GoogleAds => self.google_ads()?.validate()?,
            ProviderKind::Bigquery => self.bigquery()?.validate()?,
            ProviderKind::Mock => {}
        }

        validate_positive_number("audit.concurrency", self.audit.concurrency, 1)?;
        validate_range("audit.concurrency", self.audit.concurrency, 1, 32)?;
        validate_range("audit.default_days", self.audit.default_days, 1, 730)?;
        validate_non_empty_string("audit.currency", &self.audit.currency)?;

        self.thresholds.validate()?;

        validate_path("export.output_path", &self.export.output_path)?;
        for format in &self.export.formats {
            if !SUPPORTED_EXPORT_FORMATS.contains(&format.as_str()) {
                return Err(NavError::InvalidConfigValueError {
                    field: "export.formats".to_string(),
                    value: format.clone(),
                    reason: format!(
                        "Unsupported format. Valid formats: {}",
                        SUPPORTED_EXPORT_FORMATS.join(", ")
                    ),
                });
            }
        }

        if let Some(secret) = &self.api.jwt_secret {
            if secret.len() < 32 {
                return Err(NavError::InvalidConfigValueError {
                    field: "api.jwt_secret".to_string(),
                    value: "<redacted>".to_string(),
                    reason: "must be at least 32 bytes".to_string(),
                });
            }
        }
        validate_positive_number(
            "api.rate_limit_per_minute",
            self.api.rate_limit_per_minute as usize,
            1,
        )?;
        validate_positive_number("api.token_ttl_seconds", self.api.token_ttl_seconds as usize, 60)?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = NavConfig::from_toml_str("").unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Csv);
        assert_eq!(config.audit.concurrency, 4);
        assert_eq!(config.export.formats, vec!["json", "csv"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_google_ads_config() {
        let toml_content = r#"
[provider]
kind = "google_ads"

[provider.google_ads]
developer_token = "dev-token"
access_token = "ya29.token"
login_customer_id = "111-222-3333"
retry_attempts = 2

[audit]
analyzers = ["search_terms", "geo_performance"]
locale = "es"

[thresholds]
min_cost = 20.0
"#;

        let config = NavConfig::from_toml_str(toml_content).unwrap();
        let ads = config.google_ads().unwrap();
        assert_eq!(ads.retry_attempts, 2);
        assert_eq!(ads.api_version, "v17");
        assert_eq!(config.audit.analyzers.len(), 2);
        assert_eq!(config.thresholds.min_cost, 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PSN_TEST_DEV_TOKEN", "from-env");

        let toml_content = r#"
[provider]
kind = "google_ads"

[provider.google_ads]
developer_token = "${PSN_TEST_DEV_TOKEN}"
access_token = "${PSN_TEST_UNSET_TOKEN}"
"#;

        let config = NavConfig::from_toml_str(toml_content).unwrap();
        let ads = config.google_ads().unwrap();
        assert_eq!(ads.developer_token, "from-env");
        assert_eq!(ads.access_token, "${PSN_TEST_UNSET_TOKEN}");

        std::env::remove_var("PSN_TEST_DEV_TOKEN");
    }

    #[test]
    fn test_missing_provider_table_fails_validation() {
        let config = NavConfig::from_toml_str("[provider]\nkind = \"bigquery\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(NavError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let config = NavConfig::from_toml_str("[api]\njwt_secret = \"short\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_export_format_rejected() {
        let config = NavConfig::from_toml_str("[export]\nformats = [\"xlsx\"]\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[provider]\nkind = \"mock\"\n\n[monitoring]\nenabled = true\n")
            .unwrap();

        let config = NavConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Mock);
        assert!(config.monitoring.enabled);
    }
}
