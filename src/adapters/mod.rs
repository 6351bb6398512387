// Adapters layer: concrete implementations for external systems (report sources, storage, http, export)

pub mod bigquery;
pub mod csv_provider;
pub mod export;
pub mod google_ads;
pub mod http;
pub mod mock_provider;
pub mod report_table;
pub mod row_mapping;
pub mod storage;

use crate::config::cli::LocalStorage;
use crate::config::toml_config::{NavConfig, ProviderKind};
use crate::domain::ports::DataProvider;
use crate::utils::error::Result;
use std::sync::Arc;

/// 依設定建立資料來源；CSV 報表從本機 `provider.csv.input_dir` 讀取
pub fn provider_from_config(config: &NavConfig) -> Result<Arc<dyn DataProvider>> {
    let provider: Arc<dyn DataProvider> = match config.provider.kind {
        ProviderKind::Csv => Arc::new(csv_provider::CsvReportProvider::new(LocalStorage::new(
            config.provider.csv.input_dir.clone(),
        ))),
        ProviderKind::GoogleAds => Arc::new(google_ads::GoogleAdsProvider::new(
            config.google_ads()?.clone(),
        )?),
        ProviderKind::Bigquery => {
            Arc::new(bigquery::BigQueryProvider::new(config.bigquery()?.clone())?)
        }
        ProviderKind::Mock => Arc::new(mock_provider::MockProvider::new()),
    };

    tracing::info!(provider = provider.name(), "🔌 Data provider ready");
    Ok(provider)
}
