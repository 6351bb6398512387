pub mod bid_adjustment;
pub mod dayparting;
pub mod geo_performance;
pub mod keyword_match;
pub mod negative_conflicts;
pub mod pmax;
pub mod search_terms;

use crate::domain::model::ReportKind;
use crate::domain::ports::Analyzer;
use crate::utils::error::{NavError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

pub use bid_adjustment::BidAdjustmentAnalyzer;
pub use dayparting::DaypartingAnalyzer;
pub use geo_performance::GeoPerformanceAnalyzer;
pub use keyword_match::KeywordMatchAnalyzer;
pub use negative_conflicts::NegativeConflictsAnalyzer;
pub use pmax::PmaxAnalyzer;
pub use search_terms::SearchTermsAnalyzer;

/// 轉換數顯示：整數不帶小數
pub(crate) fn fmt_count(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub required_reports: Vec<ReportKind>,
}

#[derive(Clone)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self {
            analyzers: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SearchTermsAnalyzer));
        registry.register(Arc::new(KeywordMatchAnalyzer));
        registry.register(Arc::new(NegativeConflictsAnalyzer));
        registry.register(Arc::new(GeoPerformanceAnalyzer));
        registry.register(Arc::new(DaypartingAnalyzer));
        registry.register(Arc::new(BidAdjustmentAnalyzer));
        registry.register(Arc::new(PmaxAnalyzer));
        registry
    }

    /// 同名分析器會被取代
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.retain(|a| a.name() != analyzer.name());
        self.analyzers.push(analyzer);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers.iter().find(|a| a.name() == name).cloned()
    }

    pub fn describe(&self) -> Vec<AnalyzerInfo> {
        self.analyzers
            .iter()
            .map(|a| AnalyzerInfo {
                name: a.name(),
                description: a.description(),
                required_reports: a.required_reports().to_vec(),
            })
            .collect()
    }

    /// 空清單代表全部；重複名稱只保留一次，未知名稱回傳 ValidationError
    pub fn select(&self, names: &[String]) -> Result<Vec<Arc<dyn Analyzer>>> {
        if names.is_empty() {
            return Ok(self.analyzers.clone());
        }

        let mut seen = BTreeSet::new();
        let mut selected = Vec::new();
        for name in names {
            let name = name.trim();
            if !seen.insert(name.to_string()) {
                continue;
            }
            let analyzer = self.get(name).ok_or_else(|| {
                NavError::validation(format!(
                    "Unknown analyzer '{}'. Available: {}",
                    name,
                    self.names().join(", ")
                ))
            })?;
            selected.push(analyzer);
        }
        Ok(selected)
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// 所選分析器需要的報表聯集（依固定順序）
pub fn required_reports(analyzers: &[Arc<dyn Analyzer>]) -> Vec<ReportKind> {
    let needed: BTreeSet<ReportKind> = analyzers
        .iter()
        .flat_map(|a| a.required_reports().iter().copied())
        .collect();
    needed.into_iter().collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::thresholds::ThresholdConfig;
    use crate::domain::model::{AccountSnapshot, CustomerId, DateRange, Metrics};
    use crate::domain::ports::AnalysisContext;
    use crate::i18n::Catalog;

    pub struct Fixture {
        pub customer_id: CustomerId,
        pub date_range: DateRange,
        pub thresholds: ThresholdConfig,
        pub catalog: Catalog,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self {
                customer_id: CustomerId::new("1234567890").unwrap(),
                date_range: DateRange::parse("2026-01-01", "2026-01-31").unwrap(),
                thresholds: ThresholdConfig::default(),
                catalog: Catalog::default(),
            }
        }

        pub fn context<'a>(&'a self, snapshot: &'a AccountSnapshot) -> AnalysisContext<'a> {
            AnalysisContext {
                customer_id: &self.customer_id,
                date_range: &self.date_range,
                snapshot,
                thresholds: &self.thresholds,
                catalog: &self.catalog,
            }
        }
    }

    pub fn m(clicks: u64, cost: f64, conversions: f64) -> Metrics {
        Metrics {
            impressions: clicks * 20,
            clicks,
            cost,
            conversions,
            conversion_value: 0.0,
        }
    }
}
