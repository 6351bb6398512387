use crate::config::thresholds::ThresholdConfig;
use crate::domain::model::{
    AccountSnapshot, AnalysisResult, AuditReport, CustomerId, DateRange, ReportData, ReportKind,
};
use crate::i18n::Catalog;
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn list_files(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
}

/// 廣告成效資料來源（Google Ads API、BigQuery、CSV、模擬資料）
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kind: ReportKind,
    ) -> Result<ReportData>;

    /// 以有限並行度載入多份報表；NotFound 視為空報表
    async fn fetch_snapshot(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kinds: &[ReportKind],
        concurrency: usize,
    ) -> Result<AccountSnapshot> {
        let reports: Vec<ReportData> = stream::iter(kinds.iter().copied())
            .map(|kind| async move {
                match self.fetch(customer_id, range, kind).await {
                    Ok(data) => Ok(data),
                    Err(NavError::NotFound { entity, id }) => {
                        tracing::warn!(
                            provider = self.name(),
                            report = %kind,
                            "⚠️ {} '{}' not available, continuing with an empty report",
                            entity,
                            id
                        );
                        Ok(ReportData::empty(kind))
                    }
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        let mut snapshot = AccountSnapshot::default();
        for data in reports {
            tracing::debug!(report = %data.kind(), rows = data.len(), "📥 Report loaded");
            snapshot.insert(data);
        }
        Ok(snapshot)
    }
}

/// 讓執行期選擇的資料來源（`Arc<dyn DataProvider>`）也能交給 `AuditService`
#[async_trait]
impl<T: DataProvider + ?Sized> DataProvider for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kind: ReportKind,
    ) -> Result<ReportData> {
        (**self).fetch(customer_id, range, kind).await
    }

    async fn fetch_snapshot(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kinds: &[ReportKind],
        concurrency: usize,
    ) -> Result<AccountSnapshot> {
        (**self)
            .fetch_snapshot(customer_id, range, kinds, concurrency)
            .await
    }
}

/// 分析器輸入
pub struct AnalysisContext<'a> {
    pub customer_id: &'a CustomerId,
    pub date_range: &'a DateRange,
    pub snapshot: &'a AccountSnapshot,
    pub thresholds: &'a ThresholdConfig,
    pub catalog: &'a Catalog,
}

impl AnalysisContext<'_> {
    pub fn new_result(&self, analyzer: &str) -> AnalysisResult {
        AnalysisResult::new(analyzer, self.customer_id.clone(), *self.date_range)
    }
}

/// 無狀態分析器：同樣輸入永遠得到同樣建議
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn required_reports(&self) -> &'static [ReportKind];
    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult>;
}

pub trait Exporter: Send + Sync {
    fn format(&self) -> &'static str;
    fn file_extension(&self) -> &'static str;

    fn file_name(&self) -> String {
        format!("audit.{}", self.file_extension())
    }

    fn export(&self, report: &AuditReport) -> Result<Vec<u8>>;
}
