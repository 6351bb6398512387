use crate::domain::model::{
    CampaignRow, CampaignType, CustomerId, DateRange, Device, DeviceRow, GeoRow, HourlyRow,
    KeywordRow, MatchType, Metrics, NegativeKeyword, NegativeLevel, ReportData, ReportKind,
    SearchTermRow,
};
use crate::domain::ports::DataProvider;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Weekday;

const BRAND: &str = "Brand - Search";
const GENERIC: &str = "Generic - Search";
const PMAX: &str = "PMax - All Products";

/// 以客戶 ID 為種子的 xorshift，同一客戶永遠得到相同資料
struct Seeded(u64);

impl Seeded {
    fn new(customer_id: &CustomerId) -> Self {
        let seed = customer_id.as_str().parse::<u64>().unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// 0.8 ~ 1.2 的縮放係數
    fn factor(&mut self) -> f64 {
        0.8 + (self.next() % 401) as f64 / 1000.0
    }
}

fn metrics(rng: &mut Seeded, impressions: u64, clicks: u64, cost: f64, conversions: f64) -> Metrics {
    let f = rng.factor();
    let conversions = (conversions * f).round();
    Metrics {
        impressions: (impressions as f64 * f).round() as u64,
        clicks: (clicks as f64 * f).round() as u64,
        cost: (cost * f * 100.0).round() / 100.0,
        conversions,
        conversion_value: conversions * 60.0,
    }
}

fn campaigns(rng: &mut Seeded) -> Vec<CampaignRow> {
    [
        (BRAND, CampaignType::Search, 50.0, (8_000, 900, 450.0, 60.0)),
        (GENERIC, CampaignType::Search, 150.0, (40_000, 2_200, 3_300.0, 55.0)),
        (PMAX, CampaignType::PerformanceMax, 120.0, (60_000, 1_500, 2_400.0, 40.0)),
    ]
    .into_iter()
    .map(|(name, campaign_type, budget, (i, c, cost, conv))| CampaignRow {
        campaign: name.to_string(),
        campaign_type,
        status: "enabled".to_string(),
        daily_budget: Some(budget),
        metrics: metrics(rng, i, c, cost, conv),
    })
    .collect()
}

fn search_terms(rng: &mut Seeded) -> Vec<SearchTermRow> {
    let rows: [(&str, Option<&str>, &str, Option<&str>, (u64, u64, f64, f64)); 9] = [
        (GENERIC, Some("Running"), "running shoes", Some("running shoes"), (5_000, 400, 520.0, 20.0)),
        (GENERIC, Some("Running"), "best running shoes for flat feet", Some("running shoes"), (900, 80, 96.0, 6.0)),
        (GENERIC, Some("Running"), "free running shoes", Some("running shoes"), (1_200, 45, 67.0, 0.0)),
        (GENERIC, Some("Generic"), "shoe repair near me", Some("shoes"), (2_000, 60, 84.0, 0.0)),
        (GENERIC, Some("Trail"), "waterproof trail shoes", Some("trail shoes"), (700, 50, 70.0, 4.0)),
        (GENERIC, Some("Generic"), "shoes", Some("shoes"), (9_000, 300, 450.0, 5.0)),
        (BRAND, Some("Brand"), "acme shoes", Some("acme"), (3_000, 600, 240.0, 45.0)),
        (PMAX, None, "running shoes", None, (4_000, 200, 300.0, 6.0)),
        (PMAX, None, "shoe cleaning kit", None, (1_500, 40, 55.0, 0.0)),
    ];

    rows.into_iter()
        .map(|(campaign, ad_group, term, keyword, (i, c, cost, conv))| SearchTermRow {
            campaign: campaign.to_string(),
            ad_group: ad_group.map(str::to_string),
            search_term: term.to_string(),
            keyword: keyword.map(str::to_string),
            match_type: keyword.map(|_| MatchType::Broad),
            metrics: metrics(rng, i, c, cost, conv),
        })
        .collect()
}

fn keywords(rng: &mut Seeded) -> Vec<KeywordRow> {
    let rows: [(&str, &str, &str, MatchType, &str, Option<u8>, (u64, u64, f64, f64)); 8] = [
        (GENERIC, "Running", "running shoes", MatchType::Exact, "enabled", Some(8), (6_000, 500, 600.0, 30.0)),
        (GENERIC, "Running", "running shoes", MatchType::Broad, "enabled", Some(5), (14_000, 700, 1_400.0, 14.0)),
        (GENERIC, "Generic", "shoes", MatchType::Broad, "enabled", Some(3), (12_000, 420, 640.0, 0.0)),
        (GENERIC, "Trail", "trail shoes", MatchType::Phrase, "enabled", Some(7), (3_000, 180, 260.0, 9.0)),
        (GENERIC, "Running", "trail shoes", MatchType::Phrase, "enabled", Some(6), (1_000, 60, 90.0, 2.0)),
        (GENERIC, "Generic", "sneakers sale", MatchType::Exact, "enabled", None, (0, 0, 0.0, 0.0)),
        (BRAND, "Brand", "acme", MatchType::Exact, "enabled", Some(10), (7_000, 850, 400.0, 58.0)),
        (BRAND, "Brand", "acme outlet", MatchType::Phrase, "paused", Some(9), (0, 0, 0.0, 0.0)),
    ];

    rows.into_iter()
        .map(|(campaign, ad_group, text, match_type, status, qs, (i, c, cost, conv))| KeywordRow {
            campaign: campaign.to_string(),
            ad_group: ad_group.to_string(),
            keyword: text.to_string(),
            match_type,
            status: status.to_string(),
            quality_score: qs,
            max_cpc: Some(2.5),
            metrics: metrics(rng, i, c, cost, conv),
        })
        .collect()
}

fn negative_keywords() -> Vec<NegativeKeyword> {
    vec![
        NegativeKeyword {
            text: "free".to_string(),
            match_type: MatchType::Broad,
            level: NegativeLevel::Campaign,
            campaign: Some(GENERIC.to_string()),
            ad_group: None,
            list_name: None,
        },
        NegativeKeyword {
            text: "trail shoes".to_string(),
            match_type: MatchType::Phrase,
            level: NegativeLevel::AdGroup,
            campaign: Some(GENERIC.to_string()),
            ad_group: Some("Trail".to_string()),
            list_name: None,
        },
        NegativeKeyword {
            text: "jobs".to_string(),
            match_type: MatchType::Broad,
            level: NegativeLevel::SharedList,
            campaign: None,
            ad_group: None,
            list_name: Some("Account exclusions".to_string()),
        },
    ]
}

fn geo(rng: &mut Seeded) -> Vec<GeoRow> {
    let rows: [(&str, (u64, u64, f64, f64)); 6] = [
        ("California", (20_000, 1_100, 1_500.0, 48.0)),
        ("Texas", (12_000, 600, 900.0, 18.0)),
        ("New York", (10_000, 500, 800.0, 30.0)),
        ("Florida", (8_000, 380, 700.0, 6.0)),
        ("Alaska", (900, 45, 95.0, 0.0)),
        ("Ohio", (3_000, 150, 200.0, 4.0)),
    ];

    rows.into_iter()
        .map(|(location, (i, c, cost, conv))| GeoRow {
            campaign: GENERIC.to_string(),
            location: location.to_string(),
            location_type: Some("LOCATION_OF_PRESENCE".to_string()),
            bid_modifier: None,
            metrics: metrics(rng, i, c, cost, conv),
        })
        .collect()
}

fn hourly(rng: &mut Seeded) -> Vec<HourlyRow> {
    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    let mut rows = Vec::with_capacity(7 * 24);
    for (d, day) in days.into_iter().enumerate() {
        for hour in 0u8..24 {
            // 深夜只花錢不轉換，上班時段轉換率較高
            let (clicks, conv) = match hour {
                0..=5 => (6, 0.0),
                9..=17 => (40, 2.0 + (d % 3) as f64),
                _ => (20, 0.5),
            };
            rows.push(HourlyRow {
                campaign: GENERIC.to_string(),
                day_of_week: day,
                hour,
                metrics: metrics(rng, clicks * 20, clicks, clicks as f64 * 1.6, conv),
            });
        }
    }
    rows
}

fn devices(rng: &mut Seeded) -> Vec<DeviceRow> {
    let rows: [(&str, Device, Option<f64>, (u64, u64, f64, f64)); 6] = [
        (GENERIC, Device::Mobile, Some(0.0), (25_000, 1_300, 1_900.0, 22.0)),
        (GENERIC, Device::Desktop, Some(0.0), (12_000, 700, 1_100.0, 28.0)),
        (GENERIC, Device::Tablet, None, (3_000, 200, 300.0, 5.0)),
        (BRAND, Device::Mobile, Some(0.1), (5_000, 550, 270.0, 35.0)),
        (BRAND, Device::Desktop, None, (2_500, 300, 150.0, 22.0)),
        (BRAND, Device::Tablet, None, (500, 50, 30.0, 3.0)),
    ];

    rows.into_iter()
        .map(|(campaign, device, bid_modifier, (i, c, cost, conv))| DeviceRow {
            campaign: campaign.to_string(),
            device,
            bid_modifier,
            metrics: metrics(rng, i, c, cost, conv),
        })
        .collect()
}

/// 示範與測試用的合成帳戶資料
#[derive(Debug, Clone, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    pub fn report(customer_id: &CustomerId, kind: ReportKind) -> ReportData {
        // 每份報表使用各自的種子偏移，避免載入順序影響結果
        let mut rng = Seeded::new(customer_id);
        for _ in 0..(kind as u8) {
            rng.next();
        }

        match kind {
            ReportKind::Campaigns => ReportData::Campaigns(campaigns(&mut rng)),
            ReportKind::SearchTerms => ReportData::SearchTerms(search_terms(&mut rng)),
            ReportKind::Keywords => ReportData::Keywords(keywords(&mut rng)),
            ReportKind::NegativeKeywords => ReportData::NegativeKeywords(negative_keywords()),
            ReportKind::Geo => ReportData::Geo(geo(&mut rng)),
            ReportKind::Hourly => ReportData::Hourly(hourly(&mut rng)),
            ReportKind::Devices => ReportData::Devices(devices(&mut rng)),
        }
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        customer_id: &CustomerId,
        _range: &DateRange,
        kind: ReportKind,
    ) -> Result<ReportData> {
        Ok(Self::report(customer_id, kind))
    }
}
