use crate::utils::error::{NavError, Result};
use crate::utils::validation::{normalize_customer_id, validate_date_range, MAX_DATE_RANGE_DAYS};
use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Google Ads 客戶 ID（10 位數字，不含 `-`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

impl CustomerId {
    /// 格式錯誤屬於請求資料問題，回報為 ValidationError
    pub fn new(raw: &str) -> Result<Self> {
        normalize_customer_id("customer_id", raw)
            .map(Self)
            .map_err(|e| NavError::validation(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CustomerId {
    type Error = NavError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", &self.0[..3], &self.0[3..6], &self.0[6..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        validate_date_range(start, end)?;
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
                NavError::validation(format!("Invalid date '{}': {} (expected YYYY-MM-DD)", value, e))
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// 截至 `today` 前一天的最近 n 天
    pub fn last_n_days(n: u32, today: NaiveDate) -> Result<Self> {
        let n = i64::from(n.max(1));
        if n > MAX_DATE_RANGE_DAYS {
            return Err(NavError::validation(format!(
                "days must be at most {} (got {})",
                MAX_DATE_RANGE_DAYS, n
            )));
        }
        let end = today
            .checked_sub_signed(Duration::days(1))
            .ok_or_else(|| NavError::validation(format!("Invalid reference date {}", today)))?;
        let start = end
            .checked_sub_signed(Duration::days(n - 1))
            .ok_or_else(|| NavError::validation(format!("{} days before {} is out of range", n, end)))?;
        Self::new(start, end)
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Phrase,
    Broad,
}

impl MatchType {
    /// 解析 UI 匯出字串與 API 列舉（"Exact match"、"PHRASE"、"Concordancia amplia"...）
    pub fn parse(value: &str) -> Option<Self> {
        let lower = value.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        // 法文詞組比對為 "Expression exacte"，需先判斷詞組
        if lower.contains("phrase")
            || lower.contains("frase")
            || lower.contains("expression")
            || lower.contains("wortgruppe")
        {
            Some(MatchType::Phrase)
        } else if lower.contains("exact") || lower.contains("genau") {
            Some(MatchType::Exact)
        } else if lower.contains("broad")
            || lower.contains("amplia")
            || lower.contains("weitgehend")
            || lower.contains("large")
        {
            Some(MatchType::Broad)
        } else {
            None
        }
    }

    /// `[kw]` → Exact，`"kw"` → Phrase，其餘無標記
    pub fn from_notation(text: &str) -> (String, Option<Self>) {
        let trimmed = text.trim();
        if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
            (trimmed[1..trimmed.len() - 1].trim().to_string(), Some(MatchType::Exact))
        } else if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            (trimmed[1..trimmed.len() - 1].trim().to_string(), Some(MatchType::Phrase))
        } else {
            (trimmed.to_string(), None)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Phrase => "phrase",
            MatchType::Broad => "broad",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Search,
    PerformanceMax,
    Shopping,
    Display,
    Video,
    Other,
}

impl CampaignType {
    pub fn parse(value: &str) -> Self {
        let lower = value.trim().to_lowercase().replace(['_', '-'], " ");
        if lower.contains("performance max") || lower == "pmax" {
            CampaignType::PerformanceMax
        } else if lower.contains("search") || lower.contains("búsqueda") || lower.contains("suche")
        {
            CampaignType::Search
        } else if lower.contains("shopping") {
            CampaignType::Shopping
        } else if lower.contains("display") {
            CampaignType::Display
        } else if lower.contains("video") {
            CampaignType::Video
        } else {
            CampaignType::Other
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Mobile,
    Desktop,
    Tablet,
    ConnectedTv,
    Other,
}

impl Device {
    pub fn parse(value: &str) -> Self {
        let lower = value.trim().to_lowercase();
        if lower.contains("mobile") || lower.contains("móvil") || lower.contains("phone") {
            Device::Mobile
        } else if lower.contains("tablet") {
            Device::Tablet
        } else if lower.contains("computer") || lower.contains("desktop") || lower.contains("ordenador")
        {
            Device::Desktop
        } else if lower.contains("tv") {
            Device::ConnectedTv
        } else {
            Device::Other
        }
    }

    /// Google Ads 僅允許對這三種裝置設定出價調整
    pub fn supports_bid_modifier(&self) -> bool {
        matches!(self, Device::Mobile | Device::Desktop | Device::Tablet)
    }
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    let lower = value.trim().to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    match prefix.as_str() {
        "mon" | "lun" => Some(Weekday::Mon),
        "tue" | "mar" | "die" => Some(Weekday::Tue),
        "wed" | "mié" | "mie" | "mit" | "mer" => Some(Weekday::Wed),
        "thu" | "jue" | "don" | "jeu" => Some(Weekday::Thu),
        "fri" | "vie" | "fre" | "ven" => Some(Weekday::Fri),
        "sat" | "sáb" | "sab" | "sam" => Some(Weekday::Sat),
        "sun" | "dom" | "son" | "dim" => Some(Weekday::Sun),
        _ => None,
    }
}

/// 關鍵字比對用正規化：小寫、去除比對符號、合併空白
pub fn normalize_keyword(text: &str) -> String {
    text.to_lowercase()
        .replace(['[', ']', '"', '+'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub conversions: f64,
    pub conversion_value: f64,
}

impl Metrics {
    pub fn ctr(&self) -> f64 {
        ratio(self.clicks as f64, self.impressions as f64)
    }

    pub fn cpc(&self) -> f64 {
        ratio(self.cost, self.clicks as f64)
    }

    pub fn conversion_rate(&self) -> f64 {
        ratio(self.conversions, self.clicks as f64)
    }

    pub fn cpa(&self) -> Option<f64> {
        (self.conversions > 0.0).then(|| self.cost / self.conversions)
    }

    pub fn roas(&self) -> Option<f64> {
        (self.cost > 0.0).then(|| self.conversion_value / self.cost)
    }

    pub fn merge(&mut self, other: &Metrics) {
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.cost += other.cost;
        self.conversions += other.conversions;
        self.conversion_value += other.conversion_value;
    }

    pub fn has_conversions(&self) -> bool {
        self.conversions > 0.0
    }
}

impl<'a> std::iter::Sum<&'a Metrics> for Metrics {
    fn sum<I: Iterator<Item = &'a Metrics>>(iter: I) -> Self {
        iter.fold(Metrics::default(), |mut acc, m| {
            acc.merge(m);
            acc
        })
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRow {
    pub campaign: String,
    pub campaign_type: CampaignType,
    pub status: String,
    pub daily_budget: Option<f64>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTermRow {
    pub campaign: String,
    pub ad_group: Option<String>,
    pub search_term: String,
    pub keyword: Option<String>,
    pub match_type: Option<MatchType>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRow {
    pub campaign: String,
    pub ad_group: String,
    pub keyword: String,
    pub match_type: MatchType,
    pub status: String,
    pub quality_score: Option<u8>,
    pub max_cpc: Option<f64>,
    pub metrics: Metrics,
}

impl KeywordRow {
    pub fn is_enabled(&self) -> bool {
        let status = self.status.trim().to_lowercase();
        status.is_empty() || status == "enabled" || status == "eligible" || status == "activa"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeLevel {
    Campaign,
    AdGroup,
    SharedList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeKeyword {
    pub text: String,
    pub match_type: MatchType,
    pub level: NegativeLevel,
    pub campaign: Option<String>,
    pub ad_group: Option<String>,
    pub list_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRow {
    pub campaign: String,
    pub location: String,
    pub location_type: Option<String>,
    pub bid_modifier: Option<f64>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRow {
    pub campaign: String,
    pub day_of_week: Weekday,
    pub hour: u8,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub campaign: String,
    pub device: Device,
    pub bid_modifier: Option<f64>,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Campaigns,
    SearchTerms,
    Keywords,
    NegativeKeywords,
    Geo,
    Hourly,
    Devices,
}

impl ReportKind {
    pub const ALL: [ReportKind; 7] = [
        ReportKind::Campaigns,
        ReportKind::SearchTerms,
        ReportKind::Keywords,
        ReportKind::NegativeKeywords,
        ReportKind::Geo,
        ReportKind::Hourly,
        ReportKind::Devices,
    ];

    /// CSV 檔名（不含副檔名）
    pub fn file_stem(&self) -> &'static str {
        match self {
            ReportKind::Campaigns => "campaigns",
            ReportKind::SearchTerms => "search_terms",
            ReportKind::Keywords => "keywords",
            ReportKind::NegativeKeywords => "negative_keywords",
            ReportKind::Geo => "geo",
            ReportKind::Hourly => "hourly",
            ReportKind::Devices => "devices",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReportData {
    Campaigns(Vec<CampaignRow>),
    SearchTerms(Vec<SearchTermRow>),
    Keywords(Vec<KeywordRow>),
    NegativeKeywords(Vec<NegativeKeyword>),
    Geo(Vec<GeoRow>),
    Hourly(Vec<HourlyRow>),
    Devices(Vec<DeviceRow>),
}

impl ReportData {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportData::Campaigns(_) => ReportKind::Campaigns,
            ReportData::SearchTerms(_) => ReportKind::SearchTerms,
            ReportData::Keywords(_) => ReportKind::Keywords,
            ReportData::NegativeKeywords(_) => ReportKind::NegativeKeywords,
            ReportData::Geo(_) => ReportKind::Geo,
            ReportData::Hourly(_) => ReportKind::Hourly,
            ReportData::Devices(_) => ReportKind::Devices,
        }
    }

    pub fn empty(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Campaigns => ReportData::Campaigns(Vec::new()),
            ReportKind::SearchTerms => ReportData::SearchTerms(Vec::new()),
            ReportKind::Keywords => ReportData::Keywords(Vec::new()),
            ReportKind::NegativeKeywords => ReportData::NegativeKeywords(Vec::new()),
            ReportKind::Geo => ReportData::Geo(Vec::new()),
            ReportKind::Hourly => ReportData::Hourly(Vec::new()),
            ReportKind::Devices => ReportData::Devices(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportData::Campaigns(rows) => rows.len(),
            ReportData::SearchTerms(rows) => rows.len(),
            ReportData::Keywords(rows) => rows.len(),
            ReportData::NegativeKeywords(rows) => rows.len(),
            ReportData::Geo(rows) => rows.len(),
            ReportData::Hourly(rows) => rows.len(),
            ReportData::Devices(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 單次稽核載入的所有報表
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub campaigns: Vec<CampaignRow>,
    pub search_terms: Vec<SearchTermRow>,
    pub keywords: Vec<KeywordRow>,
    pub negative_keywords: Vec<NegativeKeyword>,
    pub geo: Vec<GeoRow>,
    pub hourly: Vec<HourlyRow>,
    pub devices: Vec<DeviceRow>,
}

impl AccountSnapshot {
    pub fn insert(&mut self, data: ReportData) {
        match data {
            ReportData::Campaigns(rows) => self.campaigns = rows,
            ReportData::SearchTerms(rows) => self.search_terms = rows,
            ReportData::Keywords(rows) => self.keywords = rows,
            ReportData::NegativeKeywords(rows) => self.negative_keywords = rows,
            ReportData::Geo(rows) => self.geo = rows,
            ReportData::Hourly(rows) => self.hourly = rows,
            ReportData::Devices(rows) => self.devices = rows,
        }
    }

    pub fn campaign_types(&self) -> HashMap<&str, CampaignType> {
        self.campaigns
            .iter()
            .map(|c| (c.campaign.as_str(), c.campaign_type))
            .collect()
    }

    pub fn campaign_type(&self, campaign: &str) -> Option<CampaignType> {
        self.campaigns
            .iter()
            .find(|c| c.campaign == campaign)
            .map(|c| c.campaign_type)
    }
}

/// 數值越小越緊急：Critical < High < Medium < Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn is_at_least(&self, min: Priority) -> bool {
        *self <= min
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    AddNegativeKeyword,
    AddKeyword,
    TightenMatchType,
    PauseKeyword,
    ImproveQualityScore,
    ConsolidateDuplicates,
    ResolveNegativeConflict,
    IncreaseBid,
    DecreaseBid,
    ExcludeLocation,
    AdjustAdSchedule,
    ExcludeAdSchedule,
    AdjustDeviceBid,
    ReducePmaxOverlap,
}

impl RecommendationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::AddNegativeKeyword => "add_negative_keyword",
            RecommendationKind::AddKeyword => "add_keyword",
            RecommendationKind::TightenMatchType => "tighten_match_type",
            RecommendationKind::PauseKeyword => "pause_keyword",
            RecommendationKind::ImproveQualityScore => "improve_quality_score",
            RecommendationKind::ConsolidateDuplicates => "consolidate_duplicates",
            RecommendationKind::ResolveNegativeConflict => "resolve_negative_conflict",
            RecommendationKind::IncreaseBid => "increase_bid",
            RecommendationKind::DecreaseBid => "decrease_bid",
            RecommendationKind::ExcludeLocation => "exclude_location",
            RecommendationKind::AdjustAdSchedule => "adjust_ad_schedule",
            RecommendationKind::ExcludeAdSchedule => "exclude_ad_schedule",
            RecommendationKind::AdjustDeviceBid => "adjust_device_bid",
            RecommendationKind::ReducePmaxOverlap => "reduce_pmax_overlap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub entity: String,
    pub campaign: Option<String>,
    pub estimated_savings: Option<f64>,
    pub estimated_conversion_gain: Option<f64>,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl Recommendation {
    pub fn new(kind: RecommendationKind, priority: Priority, entity: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            title: String::new(),
            description: String::new(),
            entity: entity.into(),
            campaign: None,
            estimated_savings: None,
            estimated_conversion_gain: None,
            details: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, title: String, description: String) -> Self {
        self.title = title;
        self.description = description;
        self
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    pub fn with_savings(mut self, savings: f64) -> Self {
        self.estimated_savings = Some(savings);
        self
    }

    pub fn with_conversion_gain(mut self, gain: f64) -> Self {
        self.estimated_conversion_gain = Some(gain);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analyzer: String,
    pub customer_id: CustomerId,
    pub date_range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub recommendations: Vec<Recommendation>,
    pub metrics: BTreeMap<String, f64>,
    pub summary: String,
}

impl AnalysisResult {
    pub fn new(analyzer: &str, customer_id: CustomerId, date_range: DateRange) -> Self {
        Self {
            analyzer: analyzer.to_string(),
            customer_id,
            date_range,
            generated_at: Utc::now(),
            recommendations: Vec::new(),
            metrics: BTreeMap::new(),
            summary: String::new(),
        }
    }

    pub fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    /// 依優先度排序（Critical 在前），同優先度依節省金額遞減
    pub fn sort_recommendations(&mut self) {
        self.recommendations.sort_by(|a, b| {
            a.priority.cmp(&b.priority).then_with(|| {
                b.estimated_savings
                    .unwrap_or(0.0)
                    .total_cmp(&a.estimated_savings.unwrap_or(0.0))
            })
        });
    }

    pub fn total_estimated_savings(&self) -> f64 {
        self.recommendations
            .iter()
            .filter_map(|r| r.estimated_savings)
            .sum()
    }

    pub fn count_by_priority(&self) -> BTreeMap<Priority, usize> {
        let mut counts = BTreeMap::new();
        for rec in &self.recommendations {
            *counts.entry(rec.priority).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Running,
    Completed,
    PartiallyCompleted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerOutcome {
    pub analyzer: String,
    pub status: OutcomeStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub recommendation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub date_range: DateRange,
    pub status: AuditStatus,
    pub results: Vec<AnalysisResult>,
    pub outcomes: Vec<AnalyzerOutcome>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AuditReport {
    pub fn start(customer_id: CustomerId, date_range: DateRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            date_range,
            status: AuditStatus::Running,
            results: Vec::new(),
            outcomes: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn recommendations(&self) -> impl Iterator<Item = (&str, &Recommendation)> + '_ {
        self.results.iter().flat_map(|result| {
            result
                .recommendations
                .iter()
                .map(move |rec| (result.analyzer.as_str(), rec))
        })
    }

    pub fn total_recommendations(&self) -> usize {
        self.results.iter().map(|r| r.recommendations.len()).sum()
    }

    pub fn total_estimated_savings(&self) -> f64 {
        self.results.iter().map(|r| r.total_estimated_savings()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    /// MCC 管理帳戶
    pub manager_id: Option<CustomerId>,
    pub currency: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            manager_id: None,
            currency: "USD".to_string(),
            locale: "en".to_string(),
            created_at: Utc::now(),
        }
    }
}
