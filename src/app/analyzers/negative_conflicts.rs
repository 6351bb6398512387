use super::fmt_count;
use crate::domain::model::{
    normalize_keyword, AnalysisResult, KeywordRow, MatchType, NegativeKeyword, NegativeLevel,
    Priority, Recommendation, RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;

/// 否定關鍵字擋住自家關鍵字的衝突
pub struct NegativeConflictsAnalyzer;

fn tokens(text: &str) -> Vec<String> {
    normalize_keyword(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// 否定字詞是否會比對到關鍵字文字
pub fn text_blocks(negative: &[String], keyword: &[String], match_type: MatchType) -> bool {
    if negative.is_empty() {
        return false;
    }
    match match_type {
        MatchType::Exact => negative == keyword,
        MatchType::Phrase => keyword
            .windows(negative.len())
            .any(|window| window == negative),
        MatchType::Broad => negative.iter().all(|t| keyword.contains(t)),
    }
}

fn same(a: &Option<String>, b: &str) -> bool {
    a.as_deref().is_some_and(|v| v.trim().eq_ignore_ascii_case(b.trim()))
}

/// 否定字詞的作用範圍是否涵蓋關鍵字
pub fn scope_applies(negative: &NegativeKeyword, keyword: &KeywordRow) -> bool {
    match negative.level {
        NegativeLevel::AdGroup => {
            same(&negative.campaign, &keyword.campaign) && same(&negative.ad_group, &keyword.ad_group)
        }
        NegativeLevel::Campaign => same(&negative.campaign, &keyword.campaign),
        // 未套用到特定活動的共用清單視為全帳戶
        NegativeLevel::SharedList => {
            negative.campaign.is_none() || same(&negative.campaign, &keyword.campaign)
        }
    }
}

fn level_key(level: NegativeLevel) -> &'static str {
    match level {
        NegativeLevel::Campaign => "level.campaign",
        NegativeLevel::AdGroup => "level.ad_group",
        NegativeLevel::SharedList => "level.shared_list",
    }
}

impl Analyzer for NegativeConflictsAnalyzer {
    fn name(&self) -> &'static str {
        "negative_conflicts"
    }

    fn description(&self) -> &'static str {
        "Detects negative keywords that block the account's own active keywords"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Keywords, ReportKind::NegativeKeywords]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let catalog = ctx.catalog;
        let snapshot = ctx.snapshot;

        let negatives: Vec<(&NegativeKeyword, Vec<String>)> = snapshot
            .negative_keywords
            .iter()
            .map(|n| (n, tokens(&n.text)))
            .collect();
        let keywords: Vec<(&KeywordRow, Vec<String>)> = snapshot
            .keywords
            .iter()
            .filter(|k| k.is_enabled())
            .map(|k| (k, tokens(&k.keyword)))
            .collect();

        let mut conflicts = 0usize;
        let mut blocked_conversions = 0.0;

        for (keyword, kw_tokens) in &keywords {
            for (negative, neg_tokens) in &negatives {
                if !scope_applies(negative, keyword)
                    || !text_blocks(neg_tokens, kw_tokens, negative.match_type)
                {
                    continue;
                }
                conflicts += 1;

                let m = &keyword.metrics;
                blocked_conversions += m.conversions;
                let priority = if m.has_conversions() {
                    Priority::Critical
                } else if m.clicks > 0 {
                    Priority::High
                } else {
                    Priority::Medium
                };

                let args = [
                    ("negative", negative.text.clone()),
                    ("keyword", keyword.keyword.clone()),
                    ("level", catalog.message(level_key(negative.level), &[])),
                    ("match_type", negative.match_type.as_str().to_string()),
                    ("campaign", keyword.campaign.clone()),
                    ("conversions", fmt_count(m.conversions)),
                ];
                let mut rec = Recommendation::new(
                    RecommendationKind::ResolveNegativeConflict,
                    priority,
                    &keyword.keyword,
                )
                .with_text(
                    catalog.message("negative_conflicts.title", &args),
                    catalog.message("negative_conflicts.desc", &args),
                )
                .with_campaign(&keyword.campaign)
                .with_detail("negative", negative.text.as_str())
                .with_detail("negative_level", serde_json::to_value(negative.level)?)
                .with_detail("ad_group", keyword.ad_group.as_str());
                if m.has_conversions() {
                    rec = rec.with_conversion_gain(m.conversions);
                }
                if let Some(list) = &negative.list_name {
                    rec = rec.with_detail("list_name", list.as_str());
                }
                result.recommendations.push(rec);
            }
        }

        result.metric("conflicts", conflicts as f64);
        result.metric("negatives_checked", negatives.len() as f64);
        result.metric("keywords_checked", keywords.len() as f64);
        result.metric("blocked_conversions", blocked_conversions);
        result.summary = catalog.message(
            "negative_conflicts.summary",
            &[
                ("count", conflicts.to_string()),
                ("negatives", negatives.len().to_string()),
                ("keywords", keywords.len().to_string()),
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
    use crate::domain::model::{AccountSnapshot, Metrics};
    use crate::i18n::{Catalog, Locale};

    fn toks(text: &str) -> Vec<String> {
        tokens(text)
    }

    fn keyword(campaign: &str, ad_group: &str, text: &str, status: &str, metrics: Metrics) -> KeywordRow {
        KeywordRow {
            campaign: campaign.to_string(),
            ad_group: ad_group.to_string(),
            keyword: text.to_string(),
            match_type: MatchType::Exact,
            status: status.to_string(),
            quality_score: None,
            max_cpc: None,
            metrics,
        }
    }

    fn negative(text: &str, match_type: MatchType, level: NegativeLevel, campaign: Option<&str>, ad_group: Option<&str>) -> NegativeKeyword {
        NegativeKeyword {
            text: text.to_string(),
            match_type,
            level,
            campaign: campaign.map(str::to_string),
            ad_group: ad_group.map(str::to_string),
            list_name: None,
        }
    }

    #[test]
    fn test_text_matching_rules() {
        let kw = toks("best trail running shoes");

        assert!(text_blocks(&toks("trail running"), &kw, MatchType::Phrase));
        assert!(!text_blocks(&toks("running trail"), &kw, MatchType::Phrase));
        assert!(text_blocks(&toks("shoes trail"), &kw, MatchType::Broad));
        assert!(!text_blocks(&toks("trail running"), &kw, MatchType::Exact));
        assert!(text_blocks(&toks("[Best Trail Running Shoes]"), &kw, MatchType::Exact));
        assert!(!text_blocks(&toks("hiking"), &kw, MatchType::Broad));
        assert!(!text_blocks(&[], &kw, MatchType::Broad));
    }

    #[test]
    fn test_scope_rules() {
        let kw = keyword("Generic", "Trail", "trail shoes", "enabled", Metrics::default());

        assert!(scope_applies(
            &negative("x", MatchType::Broad, NegativeLevel::AdGroup, Some("Generic"), Some("Trail")),
            &kw
        ));
        assert!(!scope_applies(
            &negative("x", MatchType::Broad, NegativeLevel::AdGroup, Some("Generic"), Some("Running")),
            &kw
        ));
        assert!(!scope_applies(
            &negative("x", MatchType::Broad, NegativeLevel::Campaign, Some("Brand"), None),
            &kw
        ));
        assert!(scope_applies(
            &negative("x", MatchType::Broad, NegativeLevel::SharedList, None, None),
            &kw
        ));
    }

    #[test]
    fn test_conflict_priorities() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            keywords: vec![
                keyword("Generic", "Trail", "trail shoes", "enabled", m(30, 60.0, 3.0)),
                keyword("Generic", "Free", "free shoes", "enabled", m(4, 8.0, 0.0)),
                keyword("Generic", "Jobs", "shoe store jobs", "enabled", Metrics::default()),
                keyword("Generic", "Paused", "free trail shoes", "paused", m(4, 8.0, 1.0)),
            ],
            negative_keywords: vec![
                negative("trail shoes", MatchType::Phrase, NegativeLevel::AdGroup, Some("Generic"), Some("Trail")),
                negative("free", MatchType::Broad, NegativeLevel::Campaign, Some("Generic"), None),
                negative("jobs", MatchType::Broad, NegativeLevel::SharedList, None, None),
            ],
            ..Default::default()
        };

        let result = NegativeConflictsAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        let priorities: Vec<_> = result
            .recommendations
            .iter()
            .map(|r| (r.entity.as_str(), r.priority))
            .collect();

        assert_eq!(
            priorities,
            vec![
                ("trail shoes", Priority::Critical),
                ("free shoes", Priority::High),
                ("shoe store jobs", Priority::Medium),
            ]
        );
        assert_eq!(result.recommendations[0].estimated_conversion_gain, Some(3.0));
        assert!(result.recommendations[0].description.starts_with("Ad group negative"));
        assert_eq!(result.metrics["conflicts"], 3.0);
        assert_eq!(result.metrics["keywords_checked"], 3.0);
    }

    #[test]
    fn test_spanish_level_label() {
        let mut fixture = Fixture::new();
        fixture.catalog = Catalog::new(Locale::Es, "EUR");
        let snapshot = AccountSnapshot {
            keywords: vec![keyword("Generic", "Free", "free shoes", "enabled", m(4, 8.0, 0.0))],
            negative_keywords: vec![negative(
                "free",
                MatchType::Broad,
                NegativeLevel::Campaign,
                Some("Generic"),
                None,
            )],
            ..Default::default()
        };

        let result = NegativeConflictsAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        assert!(result.recommendations[0].description.contains("negativa de campaña"));
    }
}
