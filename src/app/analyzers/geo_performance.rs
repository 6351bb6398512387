use super::round2;
use crate::domain::model::{
    AnalysisResult, Metrics, Priority, Recommendation, RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;
use std::collections::BTreeMap;

/// 地區成效與出價調整建議
pub struct GeoPerformanceAnalyzer;

impl Analyzer for GeoPerformanceAnalyzer {
    fn name(&self) -> &'static str {
        "geo_performance"
    }

    fn description(&self) -> &'static str {
        "Compares location CPA with the account and suggests bid modifiers or exclusions"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Geo]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let t = ctx.thresholds;
        let catalog = ctx.catalog;

        let mut locations: BTreeMap<&str, Metrics> = BTreeMap::new();
        for row in &ctx.snapshot.geo {
            locations
                .entry(row.location.trim())
                .or_default()
                .merge(&row.metrics);
        }

        let total: Metrics = locations.values().sum();
        // 地區一律與帳戶實際 CPA 比較，target_cpa 只用於搜尋字詞
        let account_cpa = total.cpa();

        for (location, m) in &locations {
            let share = if total.cost > 0.0 { m.cost / total.cost } else { 0.0 };

            if !m.has_conversions() {
                if m.cost >= t.min_cost * 3.0 {
                    let args = [("location", location.to_string()), ("cost", catalog.money(m.cost))];
                    result.recommendations.push(
                        Recommendation::new(RecommendationKind::ExcludeLocation, Priority::Medium, *location)
                            .with_text(
                                catalog.message("geo.exclude.title", &args),
                                catalog.message("geo.exclude.desc", &args),
                            )
                            .with_savings(round2(m.cost))
                            .with_detail("cost_share", round2(share)),
                    );
                }
                continue;
            }

            let (Some(cpa), Some(reference)) = (m.cpa(), account_cpa) else {
                continue;
            };

            let (kind, priority, modifier, savings, key) = if m.conversions >= t.min_conversions
                && cpa <= t.strong_performance_ratio * reference
            {
                let modifier = (reference / cpa - 1.0).min(t.max_bid_increase);
                (RecommendationKind::IncreaseBid, Priority::Medium, modifier, None, "geo.increase")
            } else if cpa >= t.weak_performance_ratio * reference {
                let modifier = (reference / cpa - 1.0).max(t.max_bid_decrease);
                let priority = if share >= 0.1 { Priority::High } else { Priority::Medium };
                // 以參考 CPA 取得同樣轉換時的超額花費
                let excess = (m.cost - m.conversions * reference).max(0.0);
                (RecommendationKind::DecreaseBid, priority, modifier, Some(excess), "geo.decrease")
            } else {
                continue;
            };

            let args = [
                ("location", location.to_string()),
                ("cpa", catalog.money(cpa)),
                ("account_cpa", catalog.money(reference)),
                ("modifier", catalog.modifier(modifier)),
            ];
            let mut rec = Recommendation::new(kind, priority, *location)
                .with_text(
                    catalog.message(&format!("{}.title", key), &args),
                    catalog.message(&format!("{}.desc", key), &args),
                )
                .with_detail("bid_modifier", round2(modifier))
                .with_detail("cpa", round2(cpa))
                .with_detail("cost_share", round2(share));
            if let Some(savings) = savings {
                rec = rec.with_savings(round2(savings));
            }
            result.recommendations.push(rec);
        }

        let mut ranked: Vec<(&str, f64)> = locations
            .iter()
            .filter(|(_, m)| m.conversions >= t.min_conversions)
            .filter_map(|(loc, m)| m.cpa().map(|cpa| (*loc, cpa)))
            .collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        result.metric("locations", locations.len() as f64);
        if let Some(cpa) = account_cpa {
            result.metric("account_cpa", round2(cpa));
        }
        if let (Some(best), Some(worst)) = (ranked.first(), ranked.last()) {
            result.metric("best_location_cpa", round2(best.1));
            result.metric("worst_location_cpa", round2(worst.1));
        }
        result.summary = catalog.message(
            "geo.summary",
            &[
                ("count", locations.len().to_string()),
                ("account_cpa", catalog.money(account_cpa.unwrap_or_default())),
            ],
        );

        result.sort_recommendations();
        Ok(result)
    }
}
