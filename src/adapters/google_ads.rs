use crate::adapters::http::{build_client, ensure_success, retry_with_backoff};
use crate::adapters::report_table::{Field, RawTable};
use crate::adapters::row_mapping::map_table;
use crate::config::toml_config::GoogleAdsConfig;
use crate::domain::model::{CustomerId, DateRange, ReportData, ReportKind};
use crate::domain::ports::DataProvider;
use crate::utils::cache::{CacheStats, TtlCache};
use crate::utils::error::Result;
use crate::utils::rate_limit::TokenBucket;
use crate::utils::validation::normalize_customer_id;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const PROVIDER: &str = "google_ads";

const METRICS: &[(&str, Field)] = &[
    ("metrics.impressions", Field::Impressions),
    ("metrics.clicks", Field::Clicks),
    ("metrics.cost_micros", Field::CostMicros),
    ("metrics.conversions", Field::Conversions),
    ("metrics.conversions_value", Field::ConversionValue),
];

/// 單一 GAQL 查詢：資源、欄位對應、篩選條件
struct GaqlStatement {
    resource: &'static str,
    columns: &'static [(&'static str, Field)],
    with_metrics: bool,
    filter: Option<&'static str>,
    dated: bool,
}

impl GaqlStatement {
    fn render(&self, range: &DateRange) -> String {
        let mut fields: Vec<&str> = self.columns.iter().map(|(name, _)| *name).collect();
        if self.with_metrics {
            fields.extend(METRICS.iter().map(|(name, _)| *name));
        }

        let mut conditions = Vec::new();
        if self.dated {
            conditions.push(date_clause(range));
        }
        if let Some(filter) = self.filter {
            conditions.push(filter.to_string());
        }

        let mut query = format!("SELECT {} FROM {}", fields.join(", "), self.resource);
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query
    }

    fn all_columns(&self) -> impl Iterator<Item = &(&'static str, Field)> {
        let metrics: &[(&str, Field)] = if self.with_metrics { METRICS } else { &[] };
        self.columns.iter().chain(metrics.iter())
    }
}

pub fn date_clause(range: &DateRange) -> String {
    format!(
        "segments.date BETWEEN '{}' AND '{}'",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    )
}

fn statements(kind: ReportKind) -> &'static [GaqlStatement] {
    match kind {
        ReportKind::Campaigns => &[GaqlStatement {
            resource: "campaign",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("campaign.advertising_channel_type", Field::CampaignType),
                ("campaign.status", Field::Status),
                ("campaign_budget.amount_micros", Field::Budget),
            ],
            with_metrics: true,
            filter: Some("campaign.status != 'REMOVED'"),
            dated: true,
        }],
        ReportKind::SearchTerms => &[GaqlStatement {
            resource: "search_term_view",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("ad_group.name", Field::AdGroup),
                ("search_term_view.search_term", Field::SearchTerm),
                ("segments.keyword.info.text", Field::Keyword),
                ("segments.keyword.info.match_type", Field::MatchType),
            ],
            with_metrics: true,
            filter: None,
            dated: true,
        }],
        ReportKind::Keywords => &[GaqlStatement {
            resource: "keyword_view",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("ad_group.name", Field::AdGroup),
                ("ad_group_criterion.keyword.text", Field::Keyword),
                ("ad_group_criterion.keyword.match_type", Field::MatchType),
                ("ad_group_criterion.status", Field::Status),
                ("ad_group_criterion.quality_info.quality_score", Field::QualityScore),
                ("ad_group_criterion.effective_cpc_bid_micros", Field::MaxCpc),
            ],
            with_metrics: true,
            filter: Some("ad_group_criterion.status != 'REMOVED'"),
            dated: true,
        }],
        ReportKind::NegativeKeywords => &[
            GaqlStatement {
                resource: "campaign_criterion",
                columns: &[
                    ("campaign.name", Field::Campaign),
                    ("campaign_criterion.keyword.text", Field::Keyword),
                    ("campaign_criterion.keyword.match_type", Field::MatchType),
                ],
                with_metrics: false,
                filter: Some("campaign_criterion.negative = TRUE AND campaign_criterion.type = 'KEYWORD'"),
                dated: false,
            },
            GaqlStatement {
                resource: "ad_group_criterion",
                columns: &[
                    ("campaign.name", Field::Campaign),
                    ("ad_group.name", Field::AdGroup),
                    ("ad_group_criterion.keyword.text", Field::Keyword),
                    ("ad_group_criterion.keyword.match_type", Field::MatchType),
                ],
                with_metrics: false,
                filter: Some("ad_group_criterion.negative = TRUE AND ad_group_criterion.type = 'KEYWORD'"),
                dated: false,
            },
            GaqlStatement {
                resource: "shared_criterion",
                columns: &[
                    ("shared_set.name", Field::ListName),
                    ("shared_criterion.keyword.text", Field::Keyword),
                    ("shared_criterion.keyword.match_type", Field::MatchType),
                ],
                with_metrics: false,
                filter: Some("shared_set.type = 'NEGATIVE_KEYWORDS'"),
                dated: false,
            },
        ],
        ReportKind::Geo => &[GaqlStatement {
            resource: "geographic_view",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("geographic_view.country_criterion_id", Field::Location),
                ("geographic_view.location_type", Field::LocationType),
            ],
            with_metrics: true,
            filter: None,
            dated: true,
        }],
        ReportKind::Hourly => &[GaqlStatement {
            resource: "campaign",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("segments.day_of_week", Field::DayOfWeek),
                ("segments.hour", Field::Hour),
            ],
            with_metrics: true,
            filter: None,
            dated: true,
        }],
        ReportKind::Devices => &[GaqlStatement {
            resource: "campaign",
            columns: &[
                ("campaign.name", Field::Campaign),
                ("segments.device", Field::Device),
            ],
            with_metrics: true,
            filter: None,
            dated: true,
        }],
    }
}

/// 裝置出價調整設在 campaign_criterion，與成效分開查詢
const DEVICE_MODIFIERS: GaqlStatement = GaqlStatement {
    resource: "campaign_criterion",
    columns: &[
        ("campaign.name", Field::Campaign),
        ("campaign_criterion.device.type", Field::Device),
        ("campaign_criterion.bid_modifier", Field::BidModifier),
    ],
    with_metrics: false,
    filter: Some("campaign_criterion.type = 'DEVICE'"),
    dated: false,
};

/// `geographic_view` 只有地區 criterion id，名稱由 geo_target_constant 查得
pub fn location_name_query(ids: &[&str]) -> String {
    format!(
        "SELECT geo_target_constant.id, geo_target_constant.canonical_name FROM geo_target_constant WHERE geo_target_constant.id IN ({})",
        ids.join(", ")
    )
}

/// 報表對應的 GAQL 查詢（負面關鍵字需查詢活動、廣告群組與共用清單三處）
pub fn queries_for(kind: ReportKind, range: &DateRange) -> Vec<String> {
    statements(kind).iter().map(|s| s.render(range)).collect()
}

/// `ad_group_criterion.quality_info.quality_score` → `/adGroupCriterion/qualityInfo/qualityScore`
fn json_pointer(gaql_field: &str) -> String {
    gaql_field
        .split('.')
        .map(|segment| {
            let mut out = String::with_capacity(segment.len());
            let mut upper = false;
            for ch in segment.chars() {
                if ch == '_' {
                    upper = true;
                } else if upper {
                    out.extend(ch.to_uppercase());
                    upper = false;
                } else {
                    out.push(ch);
                }
            }
            format!("/{}", out)
        })
        .collect()
}

/// JSON 值轉為報表儲存格；除成本外的 micros 欄位換算為幣值
fn cell_value(gaql_field: &str, field: Field, value: &Value) -> Option<String> {
    let micros = gaql_field.ends_with("_micros") && field != Field::CostMicros;
    match value {
        Value::Null => None,
        Value::String(s) if micros => s.parse::<f64>().ok().map(|v| (v / 1_000_000.0).to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if micros => n.as_f64().map(|v| (v / 1_000_000.0).to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn append_results(table: &mut RawTable, statement: &GaqlStatement, results: &[Value]) {
    for (_, field) in statement.all_columns() {
        if !table.headers.contains(field) {
            table.headers.push(*field);
        }
    }

    for result in results {
        let mut row = HashMap::new();
        for (gaql_field, field) in statement.all_columns() {
            if let Some(cell) = result
                .pointer(&json_pointer(gaql_field))
                .and_then(|v| cell_value(gaql_field, *field, v))
            {
                row.insert(*field, cell);
            }
        }
        table.rows.push(row);
    }
}

#[derive(Debug, Deserialize)]
struct SearchStreamBatch {
    #[serde(default)]
    results: Vec<Value>,
}

type CacheKey = (CustomerId, ReportKind, DateRange);

/// Google Ads REST `searchStream` 資料來源
pub struct GoogleAdsProvider {
    client: Client,
    config: GoogleAdsConfig,
    login_customer_id: Option<String>,
    limiter: TokenBucket,
    cache: TtlCache<CacheKey, ReportData>,
}

impl GoogleAdsProvider {
    pub fn new(config: GoogleAdsConfig) -> Result<Self> {
        let login_customer_id = config
            .login_customer_id
            .as_deref()
            .map(|mcc| normalize_customer_id("login_customer_id", mcc))
            .transpose()?;
        let burst = config.requests_per_second.ceil().max(1.0) as u32;

        Ok(Self {
            client: build_client(Duration::from_secs(config.timeout_seconds))?,
            limiter: TokenBucket::new(burst, config.requests_per_second),
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_seconds), 512),
            login_customer_id,
            config,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn stream_url(&self, customer_id: &CustomerId) -> String {
        format!(
            "{}/{}/customers/{}/googleAds:searchStream",
            self.config.endpoint.trim_end_matches('/'),
            self.config.api_version,
            customer_id.as_str()
        )
    }

    async fn search_stream(&self, customer_id: &CustomerId, query: &str) -> Result<Vec<Value>> {
        let url = self.stream_url(customer_id);
        let url = url.as_str();
        let mcc = self.login_customer_id.as_deref();
        tracing::debug!(customer_id = %customer_id, "🔎 GAQL: {}", query);

        retry_with_backoff(
            "Google Ads searchStream",
            self.config.retry_attempts,
            Duration::from_millis(self.config.retry_delay_ms),
            || async move {
                self.limiter.acquire().await;

                let mut request = self
                    .client
                    .post(url)
                    .bearer_auth(&self.config.access_token)
                    .header("developer-token", &self.config.developer_token)
                    .json(&serde_json::json!({ "query": query }));
                if let Some(mcc) = mcc {
                    request = request.header("login-customer-id", mcc);
                }

                let response = ensure_success(PROVIDER, request.send().await?).await?;
                let batches: Vec<SearchStreamBatch> = response.json().await?;
                Ok(batches.into_iter().flat_map(|b| b.results).collect())
            },
        )
        .await
    }

    async fn resolve_location_names(&self, customer_id: &CustomerId, table: &mut RawTable) -> Result<()> {
        let mut ids: Vec<&str> = table
            .rows
            .iter()
            .filter_map(|row| row.get(&Field::Location))
            .map(String::as_str)
            .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(());
        }

        let results = self.search_stream(customer_id, &location_name_query(&ids)).await?;
        let names: HashMap<String, String> = results
            .iter()
            .filter_map(|result| {
                let id = result
                    .pointer("/geoTargetConstant/id")
                    .and_then(|v| cell_value("geo_target_constant.id", Field::Location, v))?;
                let name = result.pointer("/geoTargetConstant/canonicalName")?.as_str()?;
                Some((id, name.to_string()))
            })
            .collect();

        let mut unresolved = 0usize;
        for row in &mut table.rows {
            if let Some(location) = row.get_mut(&Field::Location) {
                match names.get(location.as_str()) {
                    Some(name) => *location = name.clone(),
                    None => unresolved += 1,
                }
            }
        }
        if unresolved > 0 {
            tracing::warn!(customer_id = %customer_id, unresolved, "⚠️ Some geo target ids have no name");
        }
        Ok(())
    }

    async fn attach_device_modifiers(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        table: &mut RawTable,
    ) -> Result<()> {
        if table.rows.is_empty() {
            return Ok(());
        }

        let results = self.search_stream(customer_id, &DEVICE_MODIFIERS.render(range)).await?;
        let mut criteria = RawTable::default();
        append_results(&mut criteria, &DEVICE_MODIFIERS, &results);

        let modifiers: HashMap<(String, String), String> = criteria
            .rows
            .into_iter()
            .filter_map(|mut row| {
                let campaign = row.remove(&Field::Campaign)?;
                let device = row.remove(&Field::Device)?;
                let modifier = row.remove(&Field::BidModifier)?;
                Some(((campaign, device), modifier))
            })
            .collect();
        if modifiers.is_empty() {
            return Ok(());
        }

        if !table.headers.contains(&Field::BidModifier) {
            table.headers.push(Field::BidModifier);
        }
        for row in &mut table.rows {
            let key = match (row.get(&Field::Campaign), row.get(&Field::Device)) {
                (Some(campaign), Some(device)) => (campaign.clone(), device.clone()),
                _ => continue,
            };
            if let Some(modifier) = modifiers.get(&key) {
                row.insert(Field::BidModifier, modifier.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataProvider for GoogleAdsProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kind: ReportKind,
    ) -> Result<ReportData> {
        let key = (customer_id.clone(), kind, *range);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(customer_id = %customer_id, report = %kind, "💾 Cache hit");
            return Ok(cached);
        }

        let mut table = RawTable::default();
        for statement in statements(kind) {
            let results = self.search_stream(customer_id, &statement.render(range)).await?;
            append_results(&mut table, statement, &results);
        }
        match kind {
            ReportKind::Geo => self.resolve_location_names(customer_id, &mut table).await?,
            ReportKind::Devices => self.attach_device_modifiers(customer_id, range, &mut table).await?,
            _ => {}
        }

        let data = map_table(kind, &table)?;
        tracing::info!(
            customer_id = %customer_id,
            report = %kind,
            rows = data.len(),
            "📊 Google Ads report fetched"
        );
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}
