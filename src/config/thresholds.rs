use crate::utils::error::{NavError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};

/// 分析器門檻值；`[thresholds]` 區段，未設定欄位使用預設值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// 判定浪費支出的最低花費
    pub min_cost: f64,
    pub min_clicks: u64,
    pub min_conversions: f64,
    /// 未設定時使用帳戶整體 CPA
    pub target_cpa: Option<f64>,
    pub broad_cpa_ratio: f64,
    pub broad_cost_share: f64,
    pub low_quality_score: u8,
    pub strong_performance_ratio: f64,
    pub weak_performance_ratio: f64,
    pub max_bid_increase: f64,
    pub max_bid_decrease: f64,
    pub conversion_rate_lift: f64,
    pub min_clicks_for_bid: u64,
    pub bid_change_step: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_cost: 10.0,
            min_clicks: 5,
            min_conversions: 2.0,
            target_cpa: None,
            broad_cpa_ratio: 1.5,
            broad_cost_share: 0.2,
            low_quality_score: 3,
            strong_performance_ratio: 0.8,
            weak_performance_ratio: 1.5,
            max_bid_increase: 0.5,
            max_bid_decrease: -0.9,
            conversion_rate_lift: 1.2,
            min_clicks_for_bid: 30,
            bid_change_step: 0.1,
        }
    }
}

impl Validate for ThresholdConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |field: &str, value: String, reason: &str| NavError::InvalidConfigValueError {
            field: format!("thresholds.{}", field),
            value,
            reason: reason.to_string(),
        };

        if self.min_cost < 0.0 {
            return Err(invalid("min_cost", self.min_cost.to_string(), "must not be negative"));
        }
        if let Some(cpa) = self.target_cpa {
            if cpa <= 0.0 {
                return Err(invalid("target_cpa", cpa.to_string(), "must be positive"));
            }
        }
        if self.broad_cpa_ratio < 1.0 {
            return Err(invalid(
                "broad_cpa_ratio",
                self.broad_cpa_ratio.to_string(),
                "must be at least 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.broad_cost_share) {
            return Err(invalid(
                "broad_cost_share",
                self.broad_cost_share.to_string(),
                "must be between 0 and 1",
            ));
        }
        if self.low_quality_score > 10 {
            return Err(invalid(
                "low_quality_score",
                self.low_quality_score.to_string(),
                "quality score is 1-10",
            ));
        }
        if self.strong_performance_ratio >= 1.0 || self.weak_performance_ratio <= 1.0 {
            return Err(invalid(
                "strong_performance_ratio",
                format!("{}/{}", self.strong_performance_ratio, self.weak_performance_ratio),
                "strong ratio must be below 1.0 and weak ratio above 1.0",
            ));
        }
        // Google Ads 出價調整範圍 -90% ~ +900%
        if !(0.0..=9.0).contains(&self.max_bid_increase)
            || !(-0.9..=0.0).contains(&self.max_bid_decrease)
        {
            return Err(invalid(
                "max_bid_increase",
                format!("{}/{}", self.max_bid_increase, self.max_bid_decrease),
                "bid modifiers must stay within -0.9 and +9.0",
            ));
        }
        Ok(())
    }
}
