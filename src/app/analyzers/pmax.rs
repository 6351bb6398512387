use super::round2;
use crate::domain::model::{
    normalize_keyword, AnalysisResult, CampaignType, Metrics, Priority, Recommendation,
    RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;
use std::collections::BTreeMap;

/// Performance Max 與搜尋活動的重疊
pub struct PmaxAnalyzer;

impl Analyzer for PmaxAnalyzer {
    fn name(&self) -> &'static str {
        "pmax"
    }

    fn description(&self) -> &'static str {
        "Measures Performance Max spend and finds terms it shares with Search campaigns"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Campaigns, ReportKind::SearchTerms, ReportKind::Keywords]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let t = ctx.thresholds;
        let catalog = ctx.catalog;
        let snapshot = ctx.snapshot;
        let types = snapshot.campaign_types();
        let is_pmax = |campaign: &str| types.get(campaign) == Some(&CampaignType::PerformanceMax);

        let total_cost: f64 = snapshot.campaigns.iter().map(|c| c.metrics.cost).sum();
        let pmax_cost: f64 = snapshot
            .campaigns
            .iter()
            .filter(|c| c.campaign_type == CampaignType::PerformanceMax)
            .map(|c| c.metrics.cost)
            .sum();
        let share = if total_cost > 0.0 { pmax_cost / total_cost } else { 0.0 };

        // 搜尋活動覆蓋的字詞：搜尋字詞與關鍵字（term → 活動 → 成效）
        let mut covered: BTreeMap<String, BTreeMap<&str, Metrics>> = BTreeMap::new();
        for row in snapshot.search_terms.iter().filter(|r| !is_pmax(&r.campaign)) {
            covered
                .entry(normalize_keyword(&row.search_term))
                .or_default()
                .entry(row.campaign.as_str())
                .or_default()
                .merge(&row.metrics);
        }
        for kw in snapshot.keywords.iter().filter(|k| !is_pmax(&k.campaign)) {
            covered
                .entry(normalize_keyword(&kw.keyword))
                .or_default()
                .entry(kw.campaign.as_str())
                .or_default();
        }

        let mut pmax_terms: BTreeMap<(&str, String), (String, Metrics)> = BTreeMap::new();
        for row in snapshot.search_terms.iter().filter(|r| is_pmax(&r.campaign)) {
            pmax_terms
                .entry((row.campaign.as_str(), normalize_keyword(&row.search_term)))
                .or_insert_with(|| (row.search_term.trim().to_string(), Metrics::default()))
                .1
                .merge(&row.metrics);
        }

        let mut overlaps = 0usize;
        let mut overlap_cost = 0.0;
        for ((pmax_campaign, normalized), (display, m)) in &pmax_terms {
            if let Some(search) = covered.get(normalized) {
                overlaps += 1;
                overlap_cost += m.cost;

                // 以花費最高的搜尋活動為代表
                let (search_campaign, search_metrics) = search
                    .iter()
                    .max_by(|a, b| a.1.cost.total_cmp(&b.1.cost))
                    .map(|(c, m)| (*c, *m))
                    .unwrap_or_default();

                let search_cheaper = match (search_metrics.cpa(), m.cpa()) {
                    (Some(search_cpa), Some(pmax_cpa)) => search_cpa < pmax_cpa,
                    (Some(_), None) => true,
                    _ => false,
                };
                let priority = if search_cheaper { Priority::High } else { Priority::Medium };

                let args = [
                    ("term", display.clone()),
                    ("pmax_campaign", pmax_campaign.to_string()),
                    ("pmax_cost", catalog.money(m.cost)),
                    ("search_campaign", search_campaign.to_string()),
                ];
                let mut rec = Recommendation::new(RecommendationKind::ReducePmaxOverlap, priority, display)
                    .with_text(
                        catalog.message("pmax.overlap.title", &args),
                        catalog.message("pmax.overlap.desc", &args),
                    )
                    .with_campaign(*pmax_campaign)
                    .with_detail("search_campaign", search_campaign)
                    .with_detail("pmax_cost", round2(m.cost));
                if let Some(cpa) = m.cpa() {
                    rec = rec.with_detail("pmax_cpa", round2(cpa));
                }
                if let Some(cpa) = search_metrics.cpa() {
                    rec = rec.with_detail("search_cpa", round2(cpa));
                }
                result.recommendations.push(rec);
                continue;
            }

            if !m.has_conversions() && m.cost >= t.min_cost {
                let args = [("term", display.clone()), ("cost", catalog.money(m.cost))];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::AddNegativeKeyword, Priority::Medium, display)
                        .with_text(
                            catalog.message("pmax.negative.title", &args),
                            catalog.message("pmax.negative.desc", &args),
                        )
                        .with_campaign(*pmax_campaign)
                        .with_savings(round2(m.cost))
                        .with_detail("level", "account"),
                );
            }
        }

        result.metric("pmax_cost", round2(pmax_cost));
        result.metric("pmax_cost_share", round2(share));
        result.metric("overlapping_terms", overlaps as f64);
        result.metric("overlap_cost", round2(overlap_cost));
        result.summary = catalog.message(
            "pmax.summary",
            &[("share", catalog.percent(share)), ("overlaps", overlaps.to_string())],
        );

        result.sort_recommendations();
        Ok(result)
    }
}
