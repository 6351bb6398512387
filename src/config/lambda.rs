#[cfg(feature = "lambda")]
use crate::config::toml_config::{NavConfig, ProviderKind};
#[cfg(feature = "lambda")]
use crate::domain::ports::Storage;
#[cfg(feature = "lambda")]
use crate::utils::error::{NavError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;

#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub s3_bucket: String,
    pub s3_prefix: String,
    pub s3_region: String,
    /// CSV 報表在 bucket 內的根目錄
    pub input_prefix: String,
    pub nav: NavConfig,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let s3_prefix = env::var("S3_PREFIX").unwrap_or_else(|_| "paid-search-nav".to_string());

        let mut nav = match env::var("PSN_CONFIG_PATH") {
            Ok(path) => NavConfig::from_file(path)?,
            Err(_) => NavConfig::default(),
        };
        if let Ok(kind) = env::var("PSN_PROVIDER") {
            nav.provider.kind =
                ProviderKind::parse(&kind).ok_or_else(|| NavError::InvalidConfigValueError {
                    field: "PSN_PROVIDER".to_string(),
                    value: kind.clone(),
                    reason: "expected csv, google_ads, bigquery or mock".to_string(),
                })?;
        }
        if let Ok(concurrency) = env::var("CONCURRENT_REQUESTS") {
            nav.audit.concurrency = concurrency.parse().unwrap_or(nav.audit.concurrency);
        }

        Ok(Self {
            s3_bucket: env::var("S3_BUCKET").map_err(|_| NavError::MissingConfigError {
                field: "S3_BUCKET".to_string(),
            })?,
            input_prefix: env::var("S3_INPUT_PREFIX")
                .unwrap_or_else(|_| format!("{}/input", s3_prefix)),
            s3_prefix,
            s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            nav,
        })
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;
        validate_aws_region("s3_region", &self.s3_region)?;
        self.nav.validate()?;

        tracing::info!("✅ Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| NavError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn validate_aws_region(field_name: &str, region: &str) -> Result<()> {
    crate::utils::validation::validate_non_empty_string(field_name, region)?;

    if !region
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(NavError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: region.to_string(),
            reason: "AWS region can only contain lowercase letters, numbers, and hyphens"
                .to_string(),
        });
    }

    Ok(())
}

#[cfg(feature = "lambda")]
fn s3_error(action: &str, message: impl std::fmt::Display) -> NavError {
    NavError::ProviderError {
        provider: "s3".to_string(),
        status: 502,
        message: format!("{} failed: {}", action, message),
    }
}

/// S3 儲存；`root` 不為空時所有路徑都放在其下
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    root: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self {
            client,
            bucket,
            root: String::new(),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.root = root.trim_matches('/').to_string();
        self
    }

    fn key(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if self.root.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.root, path)
        }
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let key = self.key(path);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(NavError::not_found("object", key));
                }
                return Err(s3_error("GetObject", service_error));
            }
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| s3_error("Reading object body", e))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = self.key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| s3_error("PutObject", e.into_service_error()))?;

        tracing::debug!(bucket = %self.bucket, key = %key, bytes = data.len(), "☁️ Object written");
        Ok(())
    }

    async fn list_files(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.key(prefix);
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| s3_error("ListObjectsV2", e.into_service_error()))?;

            for object in output.contents() {
                if let Some(key) = object.key() {
                    let relative = if self.root.is_empty() {
                        key
                    } else {
                        key.strip_prefix(&self.root)
                            .map(|k| k.trim_start_matches('/'))
                            .unwrap_or(key)
                    };
                    keys.push(relative.to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        keys.sort();
        Ok(keys)
    }
}
