use super::round2;
use crate::domain::model::{
    normalize_keyword, AnalysisResult, KeywordRow, MatchType, Metrics, Priority, Recommendation,
    RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;
use std::collections::BTreeMap;

/// 比對類型與關鍵字健康度
pub struct KeywordMatchAnalyzer;

impl KeywordMatchAnalyzer {
    fn broad_tightening(
        &self,
        ctx: &AnalysisContext<'_>,
        result: &mut AnalysisResult,
    ) -> f64 {
        let t = ctx.thresholds;
        let catalog = ctx.catalog;

        let mut by_campaign: BTreeMap<&str, BTreeMap<MatchType, Metrics>> = BTreeMap::new();
        for kw in &ctx.snapshot.keywords {
            by_campaign
                .entry(kw.campaign.as_str())
                .or_default()
                .entry(kw.match_type)
                .or_default()
                .merge(&kw.metrics);
        }

        let mut account_broad_cost = 0.0;
        for (campaign, by_type) in &by_campaign {
            let campaign_cost: f64 = by_type.values().map(|m| m.cost).sum();
            let Some(broad) = by_type.get(&MatchType::Broad) else {
                continue;
            };
            account_broad_cost += broad.cost;

            let Some(exact_cpa) = by_type.get(&MatchType::Exact).and_then(Metrics::cpa) else {
                continue;
            };
            let Some(broad_cpa) = broad.cpa() else {
                continue;
            };
            let share = if campaign_cost > 0.0 {
                broad.cost / campaign_cost
            } else {
                0.0
            };
            let ratio = broad_cpa / exact_cpa;

            if ratio > t.broad_cpa_ratio && share >= t.broad_cost_share {
                // 以 exact CPA 取得相同轉換數時可省下的花費
                let excess = (broad.cost - broad.conversions * exact_cpa).max(0.0);
                let args = [
                    ("campaign", campaign.to_string()),
                    ("broad_cpa", catalog.money(broad_cpa)),
                    ("exact_cpa", catalog.money(exact_cpa)),
                    ("ratio", format!("{:.1}", ratio)),
                    ("share", catalog.percent(share)),
                ];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::TightenMatchType, Priority::High, *campaign)
                        .with_text(
                            catalog.message("keyword_match.broad.title", &args),
                            catalog.message("keyword_match.broad.desc", &args),
                        )
                        .with_campaign(*campaign)
                        .with_savings(round2(excess))
                        .with_detail("broad_cpa", round2(broad_cpa))
                        .with_detail("exact_cpa", round2(exact_cpa))
                        .with_detail("broad_cost_share", round2(share)),
                );
            }
        }
        account_broad_cost
    }

    fn keyword_health(&self, ctx: &AnalysisContext<'_>, result: &mut AnalysisResult) {
        let t = ctx.thresholds;
        let catalog = ctx.catalog;

        for kw in &ctx.snapshot.keywords {
            let m = &kw.metrics;

            if kw.match_type == MatchType::Broad && !m.has_conversions() && m.cost >= t.min_cost {
                let args = [("keyword", kw.keyword.clone()), ("cost", catalog.money(m.cost))];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::PauseKeyword, Priority::Medium, &kw.keyword)
                        .with_text(
                            catalog.message("keyword_match.broad_waste.title", &args),
                            catalog.message("keyword_match.broad_waste.desc", &args),
                        )
                        .with_campaign(&kw.campaign)
                        .with_savings(round2(m.cost))
                        .with_detail("ad_group", kw.ad_group.as_str())
                        .with_detail("match_type", kw.match_type.as_str()),
                );
            }

            if let Some(score) = kw.quality_score {
                if score <= t.low_quality_score && m.cost > 0.0 {
                    let args = [
                        ("keyword", kw.keyword.clone()),
                        ("score", score.to_string()),
                        ("cost", catalog.money(m.cost)),
                    ];
                    result.recommendations.push(
                        Recommendation::new(
                            RecommendationKind::ImproveQualityScore,
                            Priority::Medium,
                            &kw.keyword,
                        )
                        .with_text(
                            catalog.message("keyword_match.low_qs.title", &args),
                            catalog.message("keyword_match.low_qs.desc", &args),
                        )
                        .with_campaign(&kw.campaign)
                        .with_detail("ad_group", kw.ad_group.as_str())
                        .with_detail("quality_score", score),
                    );
                }
            }

            if kw.is_enabled() && m.impressions == 0 {
                let args = [("keyword", kw.keyword.clone())];
                result.recommendations.push(
                    Recommendation::new(RecommendationKind::PauseKeyword, Priority::Low, &kw.keyword)
                        .with_text(
                            catalog.message("keyword_match.zero_impr.title", &args),
                            catalog.message("keyword_match.zero_impr.desc", &args),
                        )
                        .with_campaign(&kw.campaign)
                        .with_detail("ad_group", kw.ad_group.as_str()),
                );
            }
        }
    }

    fn duplicates(&self, ctx: &AnalysisContext<'_>, result: &mut AnalysisResult) -> usize {
        let catalog = ctx.catalog;

        let mut groups: BTreeMap<(&str, String, MatchType), Vec<&KeywordRow>> = BTreeMap::new();
        for kw in &ctx.snapshot.keywords {
            groups
                .entry((kw.campaign.as_str(), normalize_keyword(&kw.keyword), kw.match_type))
                .or_default()
                .push(kw);
        }

        let mut found = 0;
        for ((campaign, _, match_type), rows) in groups {
            let mut ad_groups: Vec<&str> = rows.iter().map(|k| k.ad_group.as_str()).collect();
            ad_groups.sort_unstable();
            ad_groups.dedup();
            if ad_groups.len() < 2 {
                continue;
            }
            found += 1;

            let keyword = rows[0].keyword.clone();
            let args = [
                ("keyword", keyword.clone()),
                ("match_type", match_type.as_str().to_string()),
                ("count", ad_groups.len().to_string()),
                ("ad_groups", ad_groups.join(", ")),
            ];
            result.recommendations.push(
                Recommendation::new(RecommendationKind::ConsolidateDuplicates, Priority::Low, keyword)
                    .with_text(
                        catalog.message("keyword_match.duplicate.title", &args),
                        catalog.message("keyword_match.duplicate.desc", &args),
                    )
                    .with_campaign(campaign)
                    .with_detail("ad_groups", ad_groups),
            );
        }
        found
    }
}

impl Analyzer for KeywordMatchAnalyzer {
    fn name(&self) -> &'static str {
        "keyword_match"
    }

    fn description(&self) -> &'static str {
        "Compares match type performance and flags broad match waste, low quality scores, duplicates and idle keywords"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Keywords]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let keywords = &ctx.snapshot.keywords;

        let broad_cost = self.broad_tightening(ctx, &mut result);
        self.keyword_health(ctx, &mut result);
        let duplicates = self.duplicates(ctx, &mut result);

        let total_cost: f64 = keywords.iter().map(|k| k.metrics.cost).sum();
        let broad_share = if total_cost > 0.0 {
            broad_cost / total_cost
        } else {
            0.0
        };

        for match_type in [MatchType::Exact, MatchType::Phrase, MatchType::Broad] {
            let totals: Metrics = keywords
                .iter()
                .filter(|k| k.match_type == match_type)
                .map(|k| &k.metrics)
                .sum();
            result.metric(&format!("{}_cost", match_type), round2(totals.cost));
            if let Some(cpa) = totals.cpa() {
                result.metric(&format!("{}_cpa", match_type), round2(cpa));
            }
        }
        result.metric("total_keywords", keywords.len() as f64);
        result.metric("broad_cost_share", round2(broad_share));
        result.metric("duplicate_groups", duplicates as f64);
        result.summary = ctx.catalog.message(
            "keyword_match.summary",
            &[
                ("count", keywords.len().to_string()),
                ("broad_share", ctx.catalog.percent(broad_share)),
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
    use crate::domain::model::AccountSnapshot;

    fn kw(ad_group: &str, text: &str, match_type: MatchType, qs: Option<u8>, metrics: Metrics) -> KeywordRow {
        KeywordRow {
            campaign: "Generic".to_string(),
            ad_group: ad_group.to_string(),
            keyword: text.to_string(),
            match_type,
            status: "Enabled".to_string(),
            quality_score: qs,
            max_cpc: None,
            metrics,
        }
    }

    fn of_kind(result: &AnalysisResult, kind: RecommendationKind) -> Vec<&Recommendation> {
        result.recommendations.iter().filter(|r| r.kind == kind).collect()
    }

    #[test]
    fn test_broad_match_tightening() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            keywords: vec![
                kw("Running", "running shoes", MatchType::Exact, Some(8), m(100, 200.0, 10.0)),
                kw("Running", "running shoes", MatchType::Broad, Some(6), m(200, 600.0, 10.0)),
            ],
            ..Default::default()
        };

        let result = KeywordMatchAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        let tighten = of_kind(&result, RecommendationKind::TightenMatchType);

        // broad CPA 60 = 3x exact CPA 20，佔 75% 花費
        assert_eq!(tighten.len(), 1);
        assert_eq!(tighten[0].priority, Priority::High);
        assert_eq!(tighten[0].estimated_savings, Some(400.0));
        assert_eq!(result.metrics["broad_cost_share"], 0.75);
        assert_eq!(result.metrics["exact_cpa"], 20.0);
    }

    #[test]
    fn test_keyword_health_checks() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            keywords: vec![
                kw("Generic", "shoes", MatchType::Broad, Some(2), m(40, 90.0, 0.0)),
                kw("Generic", "sneakers sale", MatchType::Exact, None, Metrics::default()),
                kw("Trail", "Trail Shoes", MatchType::Phrase, Some(7), m(10, 20.0, 1.0)),
                kw("Running", "trail shoes", MatchType::Phrase, Some(7), m(10, 20.0, 1.0)),
                // 比對類型不同，不算重複
                kw("Hiking", "trail shoes", MatchType::Exact, Some(7), m(10, 20.0, 1.0)),
            ],
            ..Default::default()
        };

        let result = KeywordMatchAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();

        let pauses = of_kind(&result, RecommendationKind::PauseKeyword);
        assert_eq!(pauses.len(), 2);
        assert_eq!(pauses[0].entity, "shoes");
        assert_eq!(pauses[0].priority, Priority::Medium);
        assert_eq!(pauses[1].entity, "sneakers sale");
        assert_eq!(pauses[1].priority, Priority::Low);

        let low_qs = of_kind(&result, RecommendationKind::ImproveQualityScore);
        assert_eq!(low_qs.len(), 1);
        assert_eq!(low_qs[0].entity, "shoes");

        let dups = of_kind(&result, RecommendationKind::ConsolidateDuplicates);
        assert_eq!(dups.len(), 1);
        assert!(dups[0].description.contains("Running, Trail"));
        assert_eq!(result.metrics["duplicate_groups"], 1.0);
    }

    #[test]
    fn test_empty_keywords_report() {
        let fixture = Fixture::new();
        let result = KeywordMatchAnalyzer
            .analyze(&fixture.context(&AccountSnapshot::default()))
            .unwrap();
        assert!(result.recommendations.is_empty());
        assert_eq!(result.metrics["total_keywords"], 0.0);
    }
}
