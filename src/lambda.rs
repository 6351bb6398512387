#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use chrono::Utc;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use paid_search_nav::adapters::csv_provider::CsvReportProvider;
#[cfg(feature = "lambda")]
use paid_search_nav::adapters::provider_from_config;
#[cfg(feature = "lambda")]
use paid_search_nav::adapters::storage::ObjectPath;
#[cfg(feature = "lambda")]
use paid_search_nav::config::lambda::{LambdaConfig, S3Storage};
#[cfg(feature = "lambda")]
use paid_search_nav::config::ProviderKind;
#[cfg(feature = "lambda")]
use paid_search_nav::core::{AuditRequest, AuditService, AuditSettings};
#[cfg(feature = "lambda")]
use paid_search_nav::domain::model::{AuditStatus, CustomerId, DateRange};
#[cfg(feature = "lambda")]
use paid_search_nav::domain::ports::DataProvider;
#[cfg(feature = "lambda")]
use paid_search_nav::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use std::sync::Arc;

#[cfg(feature = "lambda")]
#[derive(Deserialize)]
pub struct Request {
    pub customer_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub analyzers: Vec<String>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
}

#[cfg(feature = "lambda")]
#[derive(Serialize)]
pub struct Response {
    pub message: String,
    pub audit_id: String,
    pub status: AuditStatus,
    pub output_path: String,
    pub recommendations: usize,
}

#[cfg(feature = "lambda")]
fn boxed(e: paid_search_nav::NavError) -> Error {
    tracing::error!("❌ {} ({})", e, e.recovery_suggestion());
    Box::new(e)
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting paid-search-nav Lambda function");
    let payload = event.payload;

    // 事件中的 bucket / prefix 優先於環境變數
    if let Some(bucket) = &payload.s3_bucket {
        std::env::set_var("S3_BUCKET", bucket);
    }
    if let Some(prefix) = &payload.s3_prefix {
        std::env::set_var("S3_PREFIX", prefix);
    }

    let lambda_config = LambdaConfig::from_env().map_err(boxed)?;
    lambda_config.validate().map_err(boxed)?;
    let nav = &lambda_config.nav;

    let customer_id = CustomerId::new(&payload.customer_id).map_err(boxed)?;
    let date_range = match (&payload.start_date, &payload.end_date) {
        (Some(start), Some(end)) => DateRange::parse(start, end),
        _ => DateRange::last_n_days(nav.audit.default_days, Utc::now().date_naive()),
    }
    .map_err(boxed)?;

    // 創建AWS配置和S3客戶端
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = Region::new(lambda_config.s3_region.clone());
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(region)
        .force_path_style(true)
        .build();
    let s3_client = S3Client::from_conf(config);

    // CSV 報表放在同一個 bucket 的 input 前綴下
    let provider: Arc<dyn DataProvider> = match nav.provider.kind {
        ProviderKind::Csv => Arc::new(CsvReportProvider::new(
            S3Storage::new(s3_client.clone(), lambda_config.s3_bucket.clone())
                .with_root(&lambda_config.input_prefix),
        )),
        _ => provider_from_config(nav).map_err(boxed)?,
    };
    let storage = S3Storage::new(s3_client, lambda_config.s3_bucket.clone());

    let mut settings = AuditSettings::from_config(nav);
    settings.export_prefix = lambda_config.s3_prefix.clone();
    if !settings.export_formats.iter().any(|f| f == "zip") {
        settings.export_formats.push("zip".to_string());
    }

    let service = AuditService::from_config(provider, storage, nav).with_settings(settings);
    let request = AuditRequest::new(customer_id, date_range).with_analyzers(payload.analyzers);
    let report = service.run_audit(request).await.map_err(boxed)?;

    let output_path = format!(
        "s3://{}/{}",
        lambda_config.s3_bucket,
        ObjectPath::for_audit(&lambda_config.s3_prefix, &report).file("audit.zip")
    );
    let response = Response {
        message: match report.status {
            AuditStatus::Failed => report
                .error
                .clone()
                .unwrap_or_else(|| "Audit failed".to_string()),
            _ => "Audit completed successfully".to_string(),
        },
        audit_id: report.id.to_string(),
        status: report.status,
        output_path,
        recommendations: report.total_recommendations(),
    };

    tracing::info!(audit_id = %report.id, status = ?report.status, "✅ Lambda audit finished");
    Ok(response)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_json_logger();

    run(service_fn(function_handler)).await
}
