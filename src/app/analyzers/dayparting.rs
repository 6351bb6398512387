use super::round2;
use crate::domain::model::{
    AnalysisResult, Metrics, Priority, Recommendation, RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::i18n::Catalog;
use crate::utils::error::Result;
use chrono::Weekday;
use std::collections::BTreeMap;

/// 星期 × 小時的廣告排程分析
pub struct DaypartingAnalyzer;

const DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn slot_label(catalog: &Catalog, day: Weekday, hour: u8) -> String {
    format!("{} {:02}:00-{:02}:00", catalog.weekday(day), hour, (hour + 1) % 24)
}

/// 轉換率最高與最低的鍵（需有點擊）
fn best_and_worst<K: Copy>(groups: &BTreeMap<K, Metrics>) -> Option<(K, K)> {
    let mut ranked: Vec<(K, f64)> = groups
        .iter()
        .filter(|(_, m)| m.clicks > 0)
        .map(|(k, m)| (*k, m.conversion_rate()))
        .collect();
    // 穩定排序：同轉換率時保留較早的鍵
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Some((ranked.first()?.0, ranked.last()?.0))
}

impl Analyzer for DaypartingAnalyzer {
    fn name(&self) -> &'static str {
        "dayparting"
    }

    fn description(&self) -> &'static str {
        "Finds weekday and hour slots to exclude from or weight in the ad schedule"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Hourly]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let t = ctx.thresholds;
        let catalog = ctx.catalog;

        let mut slots: BTreeMap<(u8, u8), Metrics> = BTreeMap::new();
        let mut days: BTreeMap<u8, Metrics> = BTreeMap::new();
        let mut hours: BTreeMap<u8, Metrics> = BTreeMap::new();
        for row in &ctx.snapshot.hourly {
            let day = row.day_of_week.num_days_from_monday() as u8;
            slots.entry((day, row.hour)).or_default().merge(&row.metrics);
            days.entry(day).or_default().merge(&row.metrics);
            hours.entry(row.hour).or_default().merge(&row.metrics);
        }

        let account: Metrics = slots.values().sum();
        let account_rate = account.conversion_rate();
        let account_cpa = account.cpa();

        for (&(day, hour), m) in &slots {
            let weekday = DAYS[usize::from(day)];
            let slot = slot_label(catalog, weekday, hour);
            let base = |kind, priority| {
                Recommendation::new(kind, priority, slot.clone())
                    .with_detail("day_of_week", weekday.to_string())
                    .with_detail("hour", hour)
            };

            if !m.has_conversions() {
                if m.cost >= t.min_cost {
                    let priority = if m.cost >= t.min_cost * 5.0 {
                        Priority::High
                    } else {
                        Priority::Medium
                    };
                    let args = [("slot", slot.clone()), ("cost", catalog.money(m.cost))];
                    result.recommendations.push(
                        base(RecommendationKind::ExcludeAdSchedule, priority)
                            .with_text(
                                catalog.message("daypart.exclude.title", &args),
                                catalog.message("daypart.exclude.desc", &args),
                            )
                            .with_savings(round2(m.cost)),
                    );
                }
                continue;
            }

            let rate = m.conversion_rate();
            if account_rate > 0.0
                && m.conversions >= t.min_conversions
                && rate >= t.conversion_rate_lift * account_rate
            {
                let modifier = (rate / account_rate - 1.0).min(t.max_bid_increase);
                let args = [
                    ("slot", slot.clone()),
                    ("rate", catalog.percent(rate)),
                    ("account_rate", catalog.percent(account_rate)),
                ];
                result.recommendations.push(
                    base(RecommendationKind::AdjustAdSchedule, Priority::Medium)
                        .with_text(
                            catalog.message("daypart.increase.title", &args),
                            catalog.message("daypart.increase.desc", &args),
                        )
                        .with_conversion_gain(round2(m.conversions * modifier))
                        .with_detail("bid_modifier", round2(modifier)),
                );
                continue;
            }

            if let (Some(cpa), Some(reference)) = (m.cpa(), account_cpa) {
                if cpa >= t.weak_performance_ratio * reference {
                    let modifier = (reference / cpa - 1.0).max(t.max_bid_decrease);
                    let args = [
                        ("slot", slot.clone()),
                        ("cpa", catalog.money(cpa)),
                        ("account_cpa", catalog.money(reference)),
                    ];
                    result.recommendations.push(
                        base(RecommendationKind::AdjustAdSchedule, Priority::Medium)
                            .with_text(
                                catalog.message("daypart.decrease.title", &args),
                                catalog.message("daypart.decrease.desc", &args),
                            )
                            .with_savings(round2((m.cost - m.conversions * reference).max(0.0)))
                            .with_detail("bid_modifier", round2(modifier)),
                    );
                }
            }
        }

        result.metric("slots", slots.len() as f64);
        result.metric("account_conversion_rate", round2(account_rate * 100.0));
        if let Some((best, worst)) = best_and_worst(&hours) {
            result.metric("best_hour", best as f64);
            result.metric("worst_hour", worst as f64);
        }
        if let Some((best, worst)) = best_and_worst(&days) {
            // 0 = 週一
            result.metric("best_day", best as f64);
            result.metric("worst_day", worst as f64);
            let name = |d: u8| catalog.weekday(DAYS[usize::from(d)]);
            result.summary = catalog.message(
                "daypart.summary",
                &[("best_day", name(best)), ("worst_day", name(worst))],
            );
        }

        result.sort_recommendations();
        Ok(result)
    }
}
