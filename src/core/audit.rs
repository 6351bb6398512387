use crate::adapters::export::export_report;
use crate::adapters::storage::ObjectPath;
use crate::app::analyzers::{required_reports, AnalyzerRegistry};
use crate::config::thresholds::ThresholdConfig;
use crate::config::toml_config::NavConfig;
use crate::core::repository::Repository;
use crate::domain::model::{
    AccountSnapshot, AnalysisResult, AnalyzerOutcome, AuditReport, AuditStatus, CustomerId, DateRange,
    OutcomeStatus, Priority, Recommendation, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer, DataProvider, Storage};
use crate::i18n::{Catalog, Locale};
use crate::utils::error::{NavError, Result};
use crate::utils::monitor::{AuditPhase, SystemMonitor};
use crate::utils::pagination::{paginate, Page, PageRequest};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// 單次稽核可指定的分析器上限
pub const MAX_ANALYZERS_PER_AUDIT: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRequest {
    pub customer_id: CustomerId,
    pub date_range: DateRange,
    /// 空清單代表全部分析器
    #[serde(default)]
    pub analyzers: Vec<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl AuditRequest {
    pub fn new(customer_id: CustomerId, date_range: DateRange) -> Self {
        Self {
            customer_id,
            date_range,
            analyzers: Vec::new(),
            locale: None,
        }
    }

    pub fn with_analyzers(mut self, analyzers: Vec<String>) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// `--dry-run` 用：會執行的分析器與需要的報表
#[derive(Debug, Clone, Serialize)]
pub struct AuditPlan {
    pub analyzers: Vec<&'static str>,
    pub reports: Vec<ReportKind>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationFilter {
    pub min_priority: Option<Priority>,
    pub analyzer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationEntry {
    pub analyzer: String,
    #[serde(flatten)]
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub concurrency: usize,
    /// 請求未指定分析器時使用；空清單代表全部
    pub default_analyzers: Vec<String>,
    pub locale: String,
    pub currency: String,
    pub export_formats: Vec<String>,
    /// 物件路徑前綴（S3 用）；本地輸出為空字串
    pub export_prefix: String,
}

impl AuditSettings {
    pub fn from_config(config: &NavConfig) -> Self {
        Self {
            concurrency: config.audit.concurrency,
            default_analyzers: config.audit.analyzers.clone(),
            locale: config.audit.locale.clone(),
            currency: config.audit.currency.clone(),
            export_formats: config.export.formats.clone(),
            export_prefix: String::new(),
        }
    }
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self::from_config(&NavConfig::default())
    }
}

/// 稽核流程：載入報表 → 執行分析器 → 保存結果
pub struct AuditService<P: DataProvider, S: Storage> {
    provider: P,
    storage: S,
    repository: Arc<Repository>,
    registry: AnalyzerRegistry,
    thresholds: ThresholdConfig,
    settings: AuditSettings,
    monitor: SystemMonitor,
}

impl<P: DataProvider, S: Storage> AuditService<P, S> {
    pub fn new(provider: P, storage: S) -> Self {
        Self {
            provider,
            storage,
            repository: Arc::new(Repository::new()),
            registry: AnalyzerRegistry::with_defaults(),
            thresholds: ThresholdConfig::default(),
            settings: AuditSettings::default(),
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn from_config(provider: P, storage: S, config: &NavConfig) -> Self {
        Self::new(provider, storage)
            .with_thresholds(config.thresholds.clone())
            .with_settings(AuditSettings::from_config(config))
            .with_monitoring(config.monitoring.enabled)
    }

    pub fn with_repository(mut self, repository: Arc<Repository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_registry(mut self, registry: AnalyzerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_settings(mut self, settings: AuditSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        if enabled {
            tracing::info!("🔍 System monitoring enabled for audits");
        }
        self
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn registry(&self) -> &AnalyzerRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn Analyzer>>> {
        if names.len() > MAX_ANALYZERS_PER_AUDIT {
            return Err(NavError::validation(format!(
                "At most {} analyzers may be requested per audit (got {})",
                MAX_ANALYZERS_PER_AUDIT,
                names.len()
            )));
        }
        if names.is_empty() {
            self.registry.select(&self.settings.default_analyzers)
        } else {
            self.registry.select(names)
        }
    }

    pub fn plan(&self, request: &AuditRequest) -> Result<AuditPlan> {
        let analyzers = self.select(&request.analyzers)?;
        Ok(AuditPlan {
            analyzers: analyzers.iter().map(|a| a.name()).collect(),
            reports: required_reports(&analyzers),
        })
    }

    async fn catalog_for(&self, request: &AuditRequest) -> Catalog {
        // 請求語系優先，其次客戶設定，最後是全域設定
        let customer = self.repository.get_customer(&request.customer_id).await.ok();
        let locale = request
            .locale
            .clone()
            .or_else(|| customer.as_ref().map(|c| c.locale.clone()))
            .unwrap_or_else(|| self.settings.locale.clone());
        let currency = customer
            .map(|c| c.currency)
            .unwrap_or_else(|| self.settings.currency.clone());
        Catalog::new(Locale::parse(&locale), &currency)
    }

    pub async fn run_audit(&self, request: AuditRequest) -> Result<AuditReport> {
        let analyzers = self.select(&request.analyzers)?;
        let reports = required_reports(&analyzers);
        let catalog = self.catalog_for(&request).await;

        let mut report = AuditReport::start(request.customer_id.clone(), request.date_range);
        self.repository.insert_audit(report.clone()).await;

        tracing::info!(
            audit_id = %report.id,
            customer = %request.customer_id,
            range = %request.date_range,
            provider = self.provider.name(),
            "🚀 Audit started with {} analyzers",
            analyzers.len()
        );
        let mut tracker = self.monitor.track(report.id);

        let snapshot = match self
            .provider
            .fetch_snapshot(
                &request.customer_id,
                &request.date_range,
                &reports,
                self.settings.concurrency,
            )
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(
                    audit_id = %report.id,
                    "❌ Report loading failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                report.status = AuditStatus::Failed;
                report.error = Some(e.user_friendly_message());
                report.finished_at = Some(Utc::now());
                self.finish(&report).await?;
                tracker.finish();
                return Ok(report);
            }
        };
        tracker.phase(AuditPhase::ReportsLoaded);

        for analyzer in &analyzers {
            let (result, outcome) = self.run_analyzer(analyzer.as_ref(), &request, &snapshot, &catalog);
            report.outcomes.push(outcome);
            if let Some(result) = result {
                report.results.push(result);
            }
        }
        tracker.phase(AuditPhase::AnalysisFinished);

        let failed = report
            .outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count();
        report.status = if failed == 0 {
            AuditStatus::Completed
        } else if failed < report.outcomes.len() {
            AuditStatus::PartiallyCompleted
        } else {
            AuditStatus::Failed
        };
        if report.status == AuditStatus::Failed {
            report.error = Some("Every analyzer failed".to_string());
        }
        report.finished_at = Some(Utc::now());

        tracing::info!(
            audit_id = %report.id,
            status = ?report.status,
            recommendations = report.total_recommendations(),
            savings = report.total_estimated_savings(),
            "✅ Audit finished"
        );

        self.finish(&report).await?;
        tracker.phase(AuditPhase::Persisted);
        tracker.finish();
        Ok(report)
    }

    fn run_analyzer(
        &self,
        analyzer: &dyn Analyzer,
        request: &AuditRequest,
        snapshot: &AccountSnapshot,
        catalog: &Catalog,
    ) -> (Option<AnalysisResult>, AnalyzerOutcome) {
        let ctx = AnalysisContext {
            customer_id: &request.customer_id,
            date_range: &request.date_range,
            snapshot,
            thresholds: &self.thresholds,
            catalog,
        };

        let started = Instant::now();
        // 單一分析器失敗（含 panic）不影響其他分析器
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(&ctx)))
            .unwrap_or_else(|_| {
                Err(NavError::AnalyzerError {
                    analyzer: analyzer.name().to_string(),
                    message: "analyzer panicked".to_string(),
                })
            });
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                tracing::info!(
                    analyzer = analyzer.name(),
                    recommendations = result.recommendations.len(),
                    duration_ms,
                    "🔎 Analyzer finished"
                );
                let outcome = AnalyzerOutcome {
                    analyzer: analyzer.name().to_string(),
                    status: OutcomeStatus::Succeeded,
                    error: None,
                    duration_ms,
                    recommendation_count: result.recommendations.len(),
                };
                (Some(result), outcome)
            }
            Err(e) => {
                tracing::error!(analyzer = analyzer.name(), "❌ Analyzer failed: {}", e);
                let outcome = AnalyzerOutcome {
                    analyzer: analyzer.name().to_string(),
                    status: OutcomeStatus::Failed,
                    error: Some(e.user_friendly_message()),
                    duration_ms,
                    recommendation_count: 0,
                };
                (None, outcome)
            }
        }
    }

    /// 更新儲存庫並輸出檔案；輸出失敗只記錄警告
    async fn finish(&self, report: &AuditReport) -> Result<()> {
        self.repository.update_audit(report.clone()).await?;

        match export_report(
            &self.storage,
            report,
            &self.settings.export_formats,
            &self.settings.export_prefix,
        )
        .await
        {
            Ok(keys) => tracing::debug!(audit_id = %report.id, files = keys.len(), "💾 Audit persisted"),
            Err(e) => tracing::warn!(
                audit_id = %report.id,
                "⚠️ Failed to persist audit: {} ({})",
                e,
                e.recovery_suggestion()
            ),
        }
        Ok(())
    }

    async fn load_persisted(&self, key: &str) -> Result<AuditReport> {
        let data = self.storage.read_file(key).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// 先查記憶體，再查已保存的 audit.json
    pub async fn get_audit(&self, id: Uuid) -> Result<AuditReport> {
        if let Ok(report) = self.repository.get_audit(id).await {
            return Ok(report);
        }

        let keys = self.storage.list_files(&self.settings.export_prefix).await?;
        let key = keys
            .iter()
            .find(|k| k.ends_with("/audit.json") && ObjectPath::audit_id_from_key(k) == Some(id))
            .ok_or_else(|| NavError::not_found("Audit", id.to_string()))?;
        self.load_persisted(key).await
    }

    /// 最新的在前；包含先前執行保存在儲存空間的稽核
    pub async fn list_audits(&self, customer_id: &CustomerId) -> Result<Vec<AuditReport>> {
        let mut audits = self.repository.list_audits(customer_id).await;
        let known: HashSet<Uuid> = audits.iter().map(|a| a.id).collect();

        let prefix = ObjectPath::customer_prefix(&self.settings.export_prefix, customer_id);
        for key in self.storage.list_files(&prefix).await? {
            if !key.ends_with("/audit.json") {
                continue;
            }
            let Some(id) = ObjectPath::audit_id_from_key(&key) else {
                continue;
            };
            if known.contains(&id) {
                continue;
            }
            match self.load_persisted(&key).await {
                Ok(report) => audits.push(report),
                Err(e) => tracing::warn!("⚠️ Skipping unreadable audit {}: {}", key, e),
            }
        }

        audits.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(audits)
    }

    pub async fn recommendations(
        &self,
        id: Uuid,
        filter: &RecommendationFilter,
        page: PageRequest,
    ) -> Result<Page<RecommendationEntry>> {
        let report = self.get_audit(id).await?;

        if let Some(name) = &filter.analyzer {
            if self.registry.get(name).is_none() {
                return Err(NavError::validation(format!("Unknown analyzer '{}'", name)));
            }
        }

        let mut entries: Vec<RecommendationEntry> = report
            .recommendations()
            .filter(|(analyzer, _)| filter.analyzer.as_deref().map_or(true, |name| name == *analyzer))
            .filter(|(_, rec)| filter.min_priority.map_or(true, |min| rec.priority.is_at_least(min)))
            .map(|(analyzer, rec)| RecommendationEntry {
                analyzer: analyzer.to_string(),
                recommendation: rec.clone(),
            })
            .collect();
        // 跨分析器依優先度排序，同優先度保持分析器順序
        entries.sort_by_key(|e| e.recommendation.priority);

        Ok(paginate(entries, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock_provider::MockProvider;
    use crate::config::cli::LocalStorage;
    use crate::domain::model::ReportData;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingAnalyzer;

    impl Analyzer for FailingAnalyzer {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        fn required_reports(&self) -> &'static [ReportKind] {
            &[ReportKind::Campaigns]
        }

        fn analyze(&self, _ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
            Err(NavError::AnalyzerError {
                analyzer: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn description(&self) -> &'static str {
            "panics"
        }

        fn required_reports(&self) -> &'static [ReportKind] {
            &[]
        }

        fn analyze(&self, _ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
            panic!("unexpected input")
        }
    }

    /// 依序產生指定優先度的建議
    struct FixedAnalyzer {
        name: &'static str,
        priorities: &'static [Priority],
    }

    impl Analyzer for FixedAnalyzer {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "fixed recommendations"
        }

        fn required_reports(&self) -> &'static [ReportKind] {
            &[]
        }

        fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
            let mut result = ctx.new_result(self.name);
            for (i, priority) in self.priorities.iter().enumerate() {
                result.recommendations.push(Recommendation::new(
                    crate::domain::model::RecommendationKind::AddNegativeKeyword,
                    *priority,
                    format!("{}-{}", self.name, i),
                ));
            }
            Ok(result)
        }
    }

    struct DownProvider;

    #[async_trait]
    impl DataProvider for DownProvider {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch(&self, _: &CustomerId, _: &DateRange, _: ReportKind) -> Result<ReportData> {
            Err(NavError::ProviderError {
                provider: "down".to_string(),
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn request() -> AuditRequest {
        AuditRequest::new(
            CustomerId::new("1234567890").unwrap(),
            DateRange::parse("2026-01-01", "2026-01-31").unwrap(),
        )
    }

    fn service(dir: &TempDir) -> AuditService<MockProvider, LocalStorage> {
        AuditService::new(
            MockProvider::new(),
            LocalStorage::new(dir.path().to_string_lossy().to_string()),
        )
    }

    #[tokio::test]
    async fn test_full_audit_on_mock_account() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let report = service.run_audit(request()).await.unwrap();

        assert_eq!(report.status, AuditStatus::Completed);
        assert_eq!(report.results.len(), 7);
        assert_eq!(report.outcomes.len(), 7);
        assert!(report.total_recommendations() > 0);
        assert!(report.finished_at.is_some());

        let stored = service.get_audit(report.id).await.unwrap();
        assert_eq!(stored.status, AuditStatus::Completed);

        let path = ObjectPath::for_audit("", &report);
        assert!(dir.path().join(path.file("audit.json")).exists());
        assert!(dir.path().join(path.file("recommendations.csv")).exists());
    }

    #[tokio::test]
    async fn test_failure_isolation_and_partial_status() {
        let dir = TempDir::new().unwrap();
        let mut registry = AnalyzerRegistry::with_defaults();
        registry.register(Arc::new(FailingAnalyzer));
        registry.register(Arc::new(PanickingAnalyzer));
        let service = service(&dir).with_registry(registry);

        let report = service
            .run_audit(request().with_analyzers(vec![
                "failing".to_string(),
                "geo_performance".to_string(),
                "panicking".to_string(),
            ]))
            .await
            .unwrap();

        assert_eq!(report.status, AuditStatus::PartiallyCompleted);
        assert_eq!(report.results.len(), 1);
        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .map(|o| o.analyzer.as_str())
            .collect();
        assert_eq!(failed, vec!["failing", "panicking"]);
    }

    #[tokio::test]
    async fn test_provider_failure_marks_audit_failed() {
        let dir = TempDir::new().unwrap();
        let service = AuditService::new(
            DownProvider,
            LocalStorage::new(dir.path().to_string_lossy().to_string()),
        );

        let report = service.run_audit(request()).await.unwrap();
        assert_eq!(report.status, AuditStatus::Failed);
        assert!(report.error.unwrap().contains("status 503"));
        assert_eq!(
            service.repository().get_audit(report.id).await.unwrap().status,
            AuditStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_request_validation() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let too_many = request().with_analyzers(vec!["pmax".to_string(); 21]);
        assert!(matches!(
            service.run_audit(too_many).await,
            Err(NavError::ValidationError { .. })
        ));
        assert!(service
            .run_audit(request().with_analyzers(vec!["unknown".to_string()]))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_recommendation_filter_and_paging() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let report = service.run_audit(request()).await.unwrap();

        let filter = RecommendationFilter {
            min_priority: Some(Priority::High),
            analyzer: None,
        };
        let page = service
            .recommendations(report.id, &filter, PageRequest::new(1, 100))
            .await
            .unwrap();
        assert!(page
            .items
            .iter()
            .all(|e| e.recommendation.priority <= Priority::High));

        let filter = RecommendationFilter {
            min_priority: None,
            analyzer: Some("dayparting".to_string()),
        };
        let page = service
            .recommendations(report.id, &filter, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert!(page.items.len() <= 2);
        assert!(page.items.iter().all(|e| e.analyzer == "dayparting"));

        let bad = RecommendationFilter {
            min_priority: None,
            analyzer: Some("nope".to_string()),
        };
        assert!(service
            .recommendations(report.id, &bad, PageRequest::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_recommendations_sorted_by_priority_across_analyzers() {
        let dir = TempDir::new().unwrap();
        let mut registry = AnalyzerRegistry::new();
        registry.register(Arc::new(FixedAnalyzer {
            name: "first",
            priorities: &[Priority::Low, Priority::Critical, Priority::Medium],
        }));
        registry.register(Arc::new(FixedAnalyzer {
            name: "second",
            priorities: &[Priority::High, Priority::Critical, Priority::Low],
        }));
        let service = service(&dir).with_registry(registry);

        let report = service
            .run_audit(request().with_analyzers(vec!["first".to_string(), "second".to_string()]))
            .await
            .unwrap();
        let page = service
            .recommendations(report.id, &RecommendationFilter::default(), PageRequest::new(1, 100))
            .await
            .unwrap();

        let order: Vec<(&str, &str)> = page
            .items
            .iter()
            .map(|e| (e.analyzer.as_str(), e.recommendation.entity.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("first", "first-1"),
                ("second", "second-1"),
                ("second", "second-0"),
                ("first", "first-2"),
                ("first", "first-0"),
                ("second", "second-2"),
            ]
        );

        let second_page = service
            .recommendations(report.id, &RecommendationFilter::default(), PageRequest::new(2, 4))
            .await
            .unwrap();
        assert_eq!(second_page.total, 6);
        assert_eq!(second_page.items[0].recommendation.entity, "first-0");
    }

    #[tokio::test]
    async fn test_search_terms_alone_skips_pmax_terms() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let alone = request().with_analyzers(vec!["search_terms".to_string()]);

        let plan = service.plan(&alone).unwrap();
        assert!(plan.reports.contains(&ReportKind::Campaigns));

        let report = service.run_audit(alone).await.unwrap();
        let recs = &report.results[0].recommendations;
        assert!(!recs.is_empty());
        assert!(recs
            .iter()
            .all(|r| r.campaign.as_deref() != Some("PMax - All Products")));

        // 與 pmax 一起執行時 search_terms 的結果相同
        let together = service
            .run_audit(request().with_analyzers(vec!["search_terms".to_string(), "pmax".to_string()]))
            .await
            .unwrap();
        let search_terms = together
            .results
            .iter()
            .find(|r| r.analyzer == "search_terms")
            .unwrap();
        assert_eq!(search_terms.recommendations.len(), recs.len());
    }

    #[tokio::test]
    async fn test_persisted_audits_survive_restart() {
        let dir = TempDir::new().unwrap();
        let first = service(&dir);
        let report = first.run_audit(request()).await.unwrap();

        // 新的服務實例沒有記憶體紀錄，只能從 audit.json 讀回
        let second = service(&dir);
        let loaded = second.get_audit(report.id).await.unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.total_recommendations(), report.total_recommendations());

        let listed = second.list_audits(&report.customer_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(second.get_audit(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_plan_lists_reports() {
        let dir = TempDir::new().unwrap();
        let plan = service(&dir)
            .plan(&request().with_analyzers(vec!["geo_performance".to_string()]))
            .unwrap();
        assert_eq!(plan.analyzers, vec!["geo_performance"]);
        assert_eq!(plan.reports, vec![ReportKind::Geo]);
    }
}
