use super::round2;
use crate::domain::model::{
    AnalysisResult, DeviceRow, Metrics, Priority, Recommendation, RecommendationKind, ReportKind,
};
use crate::domain::ports::{AnalysisContext, Analyzer};
use crate::utils::error::Result;
use std::collections::BTreeMap;

/// Google Ads 裝置出價調整上限 +900%
const MAX_DEVICE_MODIFIER: f64 = 9.0;
/// -100% 代表排除裝置
const EXCLUDE_DEVICE: f64 = -1.0;

/// 裝置出價調整
pub struct BidAdjustmentAnalyzer;

/// 有轉換價值時用 ROAS，否則用轉換率
fn efficiency(m: &Metrics, use_value: bool) -> f64 {
    if use_value {
        m.roas().unwrap_or(0.0)
    } else {
        m.conversion_rate()
    }
}

impl Analyzer for BidAdjustmentAnalyzer {
    fn name(&self) -> &'static str {
        "bid_adjustment"
    }

    fn description(&self) -> &'static str {
        "Suggests device bid modifiers from device efficiency relative to each campaign"
    }

    fn required_reports(&self) -> &'static [ReportKind] {
        &[ReportKind::Devices]
    }

    fn analyze(&self, ctx: &AnalysisContext<'_>) -> Result<AnalysisResult> {
        let mut result = ctx.new_result(self.name());
        let t = ctx.thresholds;
        let catalog = ctx.catalog;

        let mut campaigns: BTreeMap<&str, Vec<&DeviceRow>> = BTreeMap::new();
        for row in &ctx.snapshot.devices {
            campaigns.entry(row.campaign.as_str()).or_default().push(row);
        }

        let mut evaluated = 0usize;
        for (campaign, rows) in &campaigns {
            let totals: Metrics = rows.iter().map(|r| &r.metrics).sum();
            let use_value = totals.conversion_value > 0.0;
            let campaign_eff = efficiency(&totals, use_value);
            if campaign_eff <= 0.0 {
                continue;
            }

            let mut devices: BTreeMap<_, (Metrics, Option<f64>)> = BTreeMap::new();
            for row in rows {
                let entry = devices.entry(row.device).or_insert((Metrics::default(), None));
                entry.0.merge(&row.metrics);
                if row.bid_modifier.is_some() {
                    entry.1 = row.bid_modifier;
                }
            }

            for (device, (m, current)) in devices {
                if !device.supports_bid_modifier() || m.clicks < t.min_clicks_for_bid {
                    continue;
                }
                evaluated += 1;

                let device_eff = efficiency(&m, use_value);
                let relative = device_eff / campaign_eff;
                let target = if device_eff <= 0.0 && m.cost >= t.min_cost {
                    EXCLUDE_DEVICE
                } else {
                    (relative - 1.0).clamp(t.max_bid_decrease, MAX_DEVICE_MODIFIER)
                };
                let current = current.unwrap_or(0.0);
                let diff = target - current;
                if diff.abs() < t.bid_change_step {
                    continue;
                }

                let priority = if diff.abs() >= 0.5 {
                    Priority::High
                } else {
                    Priority::Medium
                };
                let device_name = catalog.device(device);
                let args = [
                    ("device", device_name.clone()),
                    ("campaign", campaign.to_string()),
                    ("target", catalog.modifier(target)),
                    ("current", catalog.modifier(current)),
                    ("efficiency", catalog.percent(relative)),
                ];
                let mut rec = Recommendation::new(
                    RecommendationKind::AdjustDeviceBid,
                    priority,
                    format!("{} / {}", campaign, device_name),
                )
                .with_text(
                    catalog.message("bid.device.title", &args),
                    catalog.message("bid.device.desc", &args),
                )
                .with_campaign(*campaign)
                .with_detail("device", serde_json::to_value(device)?)
                .with_detail("current_modifier", round2(current))
                .with_detail("target_modifier", round2(target))
                .with_detail("metric", if use_value { "roas" } else { "conversion_rate" });

                if diff < 0.0 {
                    // 出價比例下降的部分視為可省下的花費
                    let reduction = 1.0 - (1.0 + target) / (1.0 + current);
                    rec = rec.with_savings(round2(m.cost * reduction));
                }
                result.recommendations.push(rec);
            }
        }

        result.metric("evaluated", evaluated as f64);
        result.metric("campaigns", campaigns.len() as f64);
        result.summary = catalog.message("bid.summary", &[("count", evaluated.to_string())]);

        result.sort_recommendations();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::analyzers::test_support::{m, Fixture};
    use crate::domain::model::{AccountSnapshot, Device};

    fn device(device: Device, modifier: Option<f64>, metrics: Metrics) -> DeviceRow {
        DeviceRow {
            campaign: "Generic".to_string(),
            device,
            bid_modifier: modifier,
            metrics,
        }
    }

    fn find(result: &AnalysisResult, device: &str) -> Option<Recommendation> {
        result
            .recommendations
            .iter()
            .find(|r| r.details["device"] == serde_json::json!(device))
            .cloned()
    }

    #[test]
    fn test_conversion_rate_based_modifiers() {
        let fixture = Fixture::new();
        // 活動轉換率 (24 + 11) / 700 = 5%
        let snapshot = AccountSnapshot {
            devices: vec![
                device(Device::Desktop, Some(0.0), m(300, 300.0, 24.0)),
                device(Device::Mobile, Some(0.0), m(400, 500.0, 11.0)),
                // 點擊數不足
                device(Device::Tablet, None, m(0, 0.0, 0.0)),
            ],
            ..Default::default()
        };

        let result = BidAdjustmentAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        assert_eq!(result.metrics["evaluated"], 2.0);

        // 桌機 8% / 5% = 1.6 → +60%
        let desktop = find(&result, "desktop").unwrap();
        assert_eq!(desktop.details["target_modifier"], serde_json::json!(0.6));
        assert_eq!(desktop.priority, Priority::High);
        assert_eq!(desktop.entity, "Generic / Desktop");

        // 行動 2.75% / 5% = 0.55 → -45%
        let mobile = find(&result, "mobile").unwrap();
        assert_eq!(mobile.details["target_modifier"], serde_json::json!(-0.45));
        assert_eq!(mobile.priority, Priority::Medium);
        assert!(mobile.estimated_savings.unwrap() > 0.0);

        assert!(find(&result, "tablet").is_none());
    }

    #[test]
    fn test_roas_and_exclusion() {
        let fixture = Fixture::new();
        let with_value = |clicks: u64, cost: f64, conversions: f64, value: f64| Metrics {
            conversion_value: value,
            ..m(clicks, cost, conversions)
        };
        let snapshot = AccountSnapshot {
            devices: vec![
                device(Device::Desktop, Some(0.0), with_value(100, 100.0, 5.0, 500.0)),
                device(Device::Mobile, Some(0.1), with_value(100, 100.0, 5.0, 500.0)),
                device(Device::Tablet, None, with_value(40, 50.0, 0.0, 0.0)),
            ],
            ..Default::default()
        };

        let result = BidAdjustmentAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();

        // ROAS 5 / 活動 4 = 1.25 → +25%，與目前 0 差距足夠
        let desktop = find(&result, "desktop").unwrap();
        assert_eq!(desktop.details["metric"], serde_json::json!("roas"));
        assert_eq!(desktop.details["target_modifier"], serde_json::json!(0.25));

        // 目前 +10%，目標 +25%，差距 0.15
        assert!(find(&result, "mobile").is_some());

        let tablet = find(&result, "tablet").unwrap();
        assert_eq!(tablet.details["target_modifier"], serde_json::json!(-1.0));
        assert_eq!(tablet.priority, Priority::High);
    }

    #[test]
    fn test_small_differences_are_ignored() {
        let fixture = Fixture::new();
        let snapshot = AccountSnapshot {
            devices: vec![
                device(Device::Desktop, Some(0.0), m(100, 100.0, 5.0)),
                device(Device::Mobile, Some(0.0), m(100, 100.0, 5.0)),
            ],
            ..Default::default()
        };

        let result = BidAdjustmentAnalyzer.analyze(&fixture.context(&snapshot)).unwrap();
        assert!(result.recommendations.is_empty());
        assert_eq!(result.metrics["evaluated"], 2.0);
    }
}
