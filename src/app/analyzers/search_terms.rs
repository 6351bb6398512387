use super::{fmt_count, round2};
use crate::domain::model::{
    normalize_keyword, AnalysisResult, CampaignType, Metrics, Priority, Recommendation,
    RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;
use std::collections::{BTreeMap, HashSet};

/// 搜尋字詞：找出浪費支出與可收割的新關鍵字
pub struct SearchTermsAnalyzer;

struct TermStats {
    display: String,
    keywords: HashSet<String>,
    metrics: Metrics,
}

impl Analyzer for SearchTermsAnalyzer {
    fn name(&self) -> &'static str {
        "search_terms"
    }

    fn description(&self) -> &'static str {
        "Finds search terms that waste spend and converting terms worth adding as keywords"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::SearchTerms, ReportKind::Keywords, ReportKind::Campaigns]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let t = ctx.thresholds;
        let catalog = ctx.catalog;
        let campaign_types = ctx.snapshot.campaign_types();

        // PMax 字詞交給 pmax 分析器
        let rows = ctx.snapshot.search_terms.iter().filter(|row| {
            campaign_types.get(row.campaign.as_str()) != Some(&CampaignType::PerformanceMax)
        });

        let mut terms: BTreeMap<(String, String), TermStats> = BTreeMap::new();
        for row in rows {
            let normalized = normalize_keyword(&row.search_term);
            if normalized.is_empty() {
                continue;
            }
            let entry = terms
                .entry((row.campaign.clone(), normalized))
                .or_insert_with(|| TermStats {
                    display: row.search_term.trim().to_string(),
                    keywords: HashSet::new(),
                    metrics: Metrics::default(),
                });
            entry.metrics.merge(&row.metrics);
            if let Some(keyword) = &row.keyword {
                entry.keywords.insert(normalize_keyword(keyword));
            }
        }

        let existing_keywords: HashSet<String> = ctx
            .snapshot
            .keywords
            .iter()
            .map(|k| normalize_keyword(&k.keyword))
            .collect();

        let total: Metrics = terms.values().map(|s| &s.metrics).sum();
        let target_cpa = t.target_cpa.or_else(|| total.cpa());

        let mut wasted_spend = 0.0;
        let mut harvest_candidates = 0usize;

        for ((campaign, normalized), stats) in &terms {
            let m = &stats.metrics;

            if !m.has_conversions() && m.clicks >= t.min_clicks && m.cost >= t.min_cost {
                wasted_spend += m.cost;
                let priority = if m.cost >= t.min_cost * 5.0 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                let args = [
                    ("term", stats.display.clone()),
                    ("cost", catalog.money(m.cost)),
                    ("clicks", m.clicks.to_string()),
                ];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::AddNegativeKeyword, priority, &stats.display)
                        .with_text(
                            catalog.message("search_terms.negative.title", &args),
                            catalog.message("search_terms.negative.desc", &args),
                        )
                        .with_campaign(campaign)
                        .with_savings(round2(m.cost))
                        .with_detail("match_type", "exact")
                        .with_detail("clicks", m.clicks),
                );
                continue;
            }

            let (Some(cpa), Some(target)) = (m.cpa(), target_cpa) else {
                continue;
            };
            let already_keyword =
                stats.keywords.contains(normalized) || existing_keywords.contains(normalized);
            if m.conversions >= t.min_conversions && cpa <= target && !already_keyword {
                harvest_candidates += 1;
                let priority = if cpa <= target / 2.0 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                let args = [
                    ("term", stats.display.clone()),
                    ("conversions", fmt_count(m.conversions)),
                    ("cpa", catalog.money(cpa)),
                    ("target", catalog.money(target)),
                ];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::AddKeyword, priority, &stats.display)
                        .with_text(
                            catalog.message("search_terms.harvest.title", &args),
                            catalog.message("search_terms.harvest.desc", &args),
                        )
                        .with_campaign(campaign)
                        .with_conversion_gain(m.conversions)
                        .with_detail("match_type", "exact")
                        .with_detail("cpa", round2(cpa)),
                );
            }
        }

        let wasted_pct = if total.cost > 0.0 {
            wasted_spend / total.cost
        } else {
            0.0
        };

        result.metric("total_search_terms", terms.len() as f64);
        result.metric("wasted_spend", round2(wasted_spend));
        result.metric("wasted_spend_pct", round2(wasted_pct * 100.0));
        result.metric("harvest_candidates", harvest_candidates as f64);
        result.summary = catalog.message(
            "search_terms.summary",
            &[
                ("count", terms.len().to_string()),
                ("wasted", catalog.money(wasted_spend)),
                ("pct", catalog.percent(wasted_pct)),
            ],
        );

        result.sort_recommendations();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::analyzers::test_support::{m, Fixture};
    use crate::domain::model::{AccountSnapshot, CampaignRow, MatchType, SearchTermRow};

    fn term(campaign: &str, text: &str, keyword: &str, metrics: Metrics) -> SearchTermRow {
        SearchTermRow {
            campaign: campaign.to_string(),
            ad_group: Some("Group".to_string()),
            search_term: text.to_string(),
            keyword: Some(keyword.to_string()),
            match_type: Some(MatchType::Broad),
            metrics,
        }
    }

    #[test]
    fn test_wasted_and_harvest_terms() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            search_terms: vec![
                term("Generic", "free shoes", "shoes", m(20, 80.0, 0.0)),
                term("Generic", "cheap socks", "shoes", m(6, 12.0, 0.0)),
                term("Generic", "trail running shoes", "shoes", m(50, 40.0, 4.0)),
                term("Generic", "shoes", "shoes", m(100, 300.0, 6.0)),
                // 點擊數不足，不算浪費
                term("Generic", "rare term", "shoes", m(2, 30.0, 0.0)),
            ],
            ..Default::default()
        };

        let result = SearchTermsAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();

        let negatives: Vec<_> = result
            .recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::AddNegativeKeyword)
            .collect();
        assert_eq!(negatives.len(), 2);
        assert_eq!(negatives[0].entity, "free shoes");
        assert_eq!(negatives[0].priority, Priority::High);
        assert_eq!(negatives[0].estimated_savings, Some(80.0));
        assert_eq!(negatives[1].priority, Priority::Medium);

        let harvest: Vec<_> = result
            .recommendations
            .iter()
            .filter(|r| r.kind == RecommendationKind::AddKeyword)
            .collect();
        // 帳戶 CPA = 462 / 10 = 46.2；"trail running shoes" CPA 10 <= 23.1
        assert_eq!(harvest.len(), 1);
        assert_eq!(harvest[0].entity, "trail running shoes");
        assert_eq!(harvest[0].priority, Priority::High);
        assert_eq!(harvest[0].estimated_conversion_gain, Some(4.0));

        assert_eq!(result.metrics["total_search_terms"], 5.0);
        assert_eq!(result.metrics["wasted_spend"], 92.0);
        assert_eq!(result.metrics["harvest_candidates"], 1.0);
        assert!(result.summary.contains("$92.00"));
    }

    #[test]
    fn test_terms_are_merged_case_insensitively() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            search_terms: vec![
                term("Generic", "Free Shoes", "shoes", m(3, 6.0, 0.0)),
                term("Generic", "free  shoes", "shoes", m(3, 6.0, 0.0)),
            ],
            ..Default::default()
        };

        let result = SearchTermsAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        assert_eq!(result.recommendations.len(), 1);
        assert_eq!(result.recommendations[0].estimated_savings, Some(12.0));
        assert_eq!(result.metrics["total_search_terms"], 1.0);
    }

    #[test]
    fn test_pmax_terms_are_skipped_and_target_cpa_is_used() {
        let mut fixture = Fixture::new();
        fixture.thresholds.target_cpa = Some(5.0);
        let snapshot = AccountSnapshot {
            campaigns: vec![CampaignRow {
                campaign: "PMax".to_string(),
                campaign_type: CampaignType::PerformanceMax,
                status: "enabled".to_string(),
                daily_budget: None,
                metrics: Metrics::default(),
            }],
            search_terms: vec![
                term("PMax", "shoe cleaning", "shoes", m(30, 90.0, 0.0)),
                term("Generic", "trail running shoes", "shoes", m(50, 40.0, 4.0)),
            ],
            ..Default::default()
        };

        let result = SearchTermsAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        // CPA 10 高於目標 5，不收割；PMax 字詞不處理
        assert!(result.recommendations.is_empty());
    }
}
