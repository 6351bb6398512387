use crate::adapters::http::{build_client, ensure_success, retry_with_backoff};
use crate::adapters::report_table::{canonical_field, Field, RawTable};
use crate::adapters::row_mapping::map_table;
use crate::config::toml_config::BigQueryConfig;
use crate::domain::model::{CustomerId, DateRange, ReportData, ReportKind};
use crate::domain::ports::DataProvider;
use crate::utils::cache::{CacheStats, TtlCache};
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const PROVIDER: &str = "bigquery";

const METRIC_COLUMNS: &str = "SUM(s.metrics_impressions) AS impressions, \
     SUM(s.metrics_clicks) AS clicks, \
     SUM(s.metrics_cost_micros) AS cost_micros, \
     SUM(s.metrics_conversions) AS conversions, \
     SUM(s.metrics_conversions_value) AS conversion_value";

/// Google Ads Data Transfer 資料表上的報表 SQL；日期以 `@start_date` / `@end_date` 參數帶入
pub fn sql_for(kind: ReportKind, project: &str, dataset: &str, customer_id: &CustomerId) -> String {
    let t = |table: &str| format!("`{}.{}.ads_{}_{}`", project, dataset, table, customer_id.as_str());
    let dated = "s.segments_date BETWEEN @start_date AND @end_date";

    match kind {
        ReportKind::Campaigns => format!(
            "SELECT c.campaign_name AS campaign, c.campaign_advertising_channel_type AS campaign_type, \
             c.campaign_status AS status, {metrics} \
             FROM {stats} s JOIN {campaign} c ON c.campaign_id = s.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             WHERE {dated} GROUP BY 1, 2, 3",
            metrics = METRIC_COLUMNS,
            stats = t("CampaignBasicStats"),
            campaign = t("Campaign"),
            dated = dated,
        ),
        ReportKind::SearchTerms => format!(
            "SELECT c.campaign_name AS campaign, g.ad_group_name AS ad_group, \
             s.search_term_view_search_term AS search_term, \
             s.segments_keyword_info_text AS keyword, s.segments_keyword_info_match_type AS match_type, {metrics} \
             FROM {stats} s \
             JOIN {campaign} c ON c.campaign_id = s.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             LEFT JOIN {ad_group} g ON g.ad_group_id = s.ad_group_id AND g._DATA_DATE = g._LATEST_DATE \
             WHERE {dated} GROUP BY 1, 2, 3, 4, 5",
            metrics = METRIC_COLUMNS,
            stats = t("SearchQueryStats"),
            campaign = t("Campaign"),
            ad_group = t("AdGroup"),
            dated = dated,
        ),
        ReportKind::Keywords => format!(
            "SELECT c.campaign_name AS campaign, g.ad_group_name AS ad_group, \
             k.ad_group_criterion_keyword_text AS keyword, k.ad_group_criterion_keyword_match_type AS match_type, \
             k.ad_group_criterion_status AS status, k.ad_group_criterion_quality_info_quality_score AS quality_score, \
             k.ad_group_criterion_effective_cpc_bid_micros / 1000000 AS max_cpc, {metrics} \
             FROM {keyword} k \
             JOIN {campaign} c ON c.campaign_id = k.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             JOIN {ad_group} g ON g.ad_group_id = k.ad_group_id AND g._DATA_DATE = g._LATEST_DATE \
             LEFT JOIN {stats} s ON s.ad_group_criterion_criterion_id = k.ad_group_criterion_criterion_id \
               AND s.ad_group_id = k.ad_group_id AND {dated} \
             WHERE k._DATA_DATE = k._LATEST_DATE AND k.ad_group_criterion_negative = FALSE \
             GROUP BY 1, 2, 3, 4, 5, 6, 7",
            metrics = METRIC_COLUMNS,
            keyword = t("Keyword"),
            campaign = t("Campaign"),
            ad_group = t("AdGroup"),
            stats = t("KeywordBasicStats"),
            dated = dated,
        ),
        ReportKind::NegativeKeywords => format!(
            "SELECT c.campaign_name AS campaign, g.ad_group_name AS ad_group, \
             k.ad_group_criterion_keyword_text AS keyword, k.ad_group_criterion_keyword_match_type AS match_type, \
             'ad group' AS level \
             FROM {keyword} k \
             JOIN {campaign} c ON c.campaign_id = k.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             JOIN {ad_group} g ON g.ad_group_id = k.ad_group_id AND g._DATA_DATE = g._LATEST_DATE \
             WHERE k._DATA_DATE = k._LATEST_DATE AND k.ad_group_criterion_negative = TRUE \
             UNION ALL \
             SELECT c.campaign_name, NULL, n.campaign_criterion_keyword_text, n.campaign_criterion_keyword_match_type, 'campaign' \
             FROM {campaign_criterion} n \
             JOIN {campaign} c ON c.campaign_id = n.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             WHERE n._DATA_DATE = n._LATEST_DATE AND n.campaign_criterion_negative = TRUE \
               AND n.campaign_criterion_type = 'KEYWORD'",
            keyword = t("Keyword"),
            campaign = t("Campaign"),
            ad_group = t("AdGroup"),
            campaign_criterion = t("CampaignCriterion"),
        ),
        ReportKind::Geo => format!(
            "SELECT c.campaign_name AS campaign, CAST(s.geographic_view_country_criterion_id AS STRING) AS location, \
             s.geographic_view_location_type AS location_type, {metrics} \
             FROM {stats} s JOIN {campaign} c ON c.campaign_id = s.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             WHERE {dated} GROUP BY 1, 2, 3",
            metrics = METRIC_COLUMNS,
            stats = t("GeoStats"),
            campaign = t("Campaign"),
            dated = dated,
        ),
        ReportKind::Hourly => format!(
            "SELECT c.campaign_name AS campaign, s.segments_day_of_week AS day_of_week, \
             s.segments_hour AS hour, {metrics} \
             FROM {stats} s JOIN {campaign} c ON c.campaign_id = s.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             WHERE {dated} GROUP BY 1, 2, 3",
            metrics = METRIC_COLUMNS,
            stats = t("HourlyCampaignStats"),
            campaign = t("Campaign"),
            dated = dated,
        ),
        ReportKind::Devices => format!(
            "SELECT c.campaign_name AS campaign, s.segments_device AS device, {metrics} \
             FROM {stats} s JOIN {campaign} c ON c.campaign_id = s.campaign_id AND c._DATA_DATE = c._LATEST_DATE \
             WHERE {dated} GROUP BY 1, 2",
            metrics = METRIC_COLUMNS,
            stats = t("CampaignBasicStats"),
            campaign = t("Campaign"),
            dated = dated,
        ),
    }
}

#[derive(Debug, Deserialize)]
struct SchemaField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Schema {
    #[serde(default)]
    fields: Vec<SchemaField>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    schema: Option<Schema>,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    job_complete: bool,
    total_bytes_processed: Option<String>,
    page_token: Option<String>,
    job_reference: Option<JobReference>,
}

fn append_rows(table: &mut RawTable, columns: &[Option<Field>], rows: Vec<Row>) {
    for row in rows {
        let mut mapped = HashMap::new();
        for (field, cell) in columns.iter().zip(row.f) {
            let Some(field) = field else { continue };
            let value = match cell.v {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };
            mapped.insert(*field, value);
        }
        table.rows.push(mapped);
    }
}

type CacheKey = (CustomerId, ReportKind, DateRange);

/// BigQuery（Google Ads Data Transfer 資料集）資料來源
pub struct BigQueryProvider {
    client: Client,
    config: BigQueryConfig,
    cache: TtlCache<CacheKey, ReportData>,
}

impl BigQueryProvider {
    pub fn new(config: BigQueryConfig) -> Result<Self> {
        // 伺服器端 timeoutMs 之外再保留一些傳輸時間
        let timeout = Duration::from_millis(config.timeout_ms) + Duration::from_secs(30);
        Ok(Self {
            client: build_client(timeout)?,
            cache: TtlCache::new(Duration::from_secs(config.cache_ttl_seconds), 512),
            config,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn request_body(&self, sql: &str, range: &DateRange, dry_run: bool) -> Value {
        let date_param = |name: &str, value: String| {
            json!({
                "name": name,
                "parameterType": { "type": "DATE" },
                "parameterValue": { "value": value }
            })
        };

        json!({
            "query": sql,
            "useLegacySql": false,
            "maximumBytesBilled": self.config.maximum_bytes_billed.to_string(),
            "timeoutMs": self.config.timeout_ms,
            "dryRun": dry_run,
            "parameterMode": "NAMED",
            "queryParameters": [
                date_param("start_date", range.start.format("%Y-%m-%d").to_string()),
                date_param("end_date", range.end.format("%Y-%m-%d").to_string()),
            ]
        })
    }

    async fn post_query(&self, body: &Value) -> Result<QueryResponse> {
        let url = format!("{}/projects/{}/queries", self.endpoint(), self.config.project_id);
        let url = url.as_str();

        retry_with_backoff(
            "BigQuery jobs.query",
            self.config.retry_attempts,
            Duration::from_millis(self.config.retry_delay_ms),
            || async move {
                let response = self
                    .client
                    .post(url)
                    .bearer_auth(&self.config.access_token)
                    .json(body)
                    .send()
                    .await?;
                let response = ensure_success(PROVIDER, response).await?;
                let parsed: QueryResponse = response.json().await?;
                Ok(parsed)
            },
        )
        .await
    }

    async fn next_page(&self, job: &JobReference, page_token: &str) -> Result<QueryResponse> {
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.endpoint(),
            self.config.project_id,
            job.job_id
        );
        let mut query: Vec<(&str, String)> = vec![
            ("pageToken", page_token.to_string()),
            ("timeoutMs", self.config.timeout_ms.to_string()),
        ];
        if let Some(location) = &job.location {
            query.push(("location", location.clone()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .query(&query)
            .send()
            .await?;
        let response = ensure_success(PROVIDER, response).await?;
        Ok(response.json().await?)
    }

    /// Dry run：回傳查詢預計掃描的 bytes，不產生費用
    pub async fn estimate_bytes(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kind: ReportKind,
    ) -> Result<u64> {
        let sql = sql_for(kind, &self.config.project_id, &self.config.dataset, customer_id);
        let response = self.post_query(&self.request_body(&sql, range, true)).await?;

        response
            .total_bytes_processed
            .as_deref()
            .and_then(|b| b.parse::<u64>().ok())
            .ok_or_else(|| NavError::ProviderError {
                provider: PROVIDER.to_string(),
                status: 200,
                message: "Dry run response did not include totalBytesProcessed".to_string(),
            })
    }

    async fn run_query(&self, kind: ReportKind, sql: &str, range: &DateRange) -> Result<RawTable> {
        let mut response = self.post_query(&self.request_body(sql, range, false)).await?;
        if !response.job_complete {
            return Err(NavError::ProviderError {
                provider: PROVIDER.to_string(),
                status: 504,
                message: format!(
                    "Query for {} did not complete within {} ms",
                    kind, self.config.timeout_ms
                ),
            });
        }

        let columns: Vec<Option<Field>> = response
            .schema
            .as_ref()
            .map(|s| s.fields.iter().map(|f| canonical_field(&f.name)).collect())
            .unwrap_or_default();
        let mut table = RawTable {
            headers: columns.iter().flatten().copied().collect(),
            rows: Vec::new(),
        };
        append_rows(&mut table, &columns, std::mem::take(&mut response.rows));

        let job = response.job_reference;
        let mut page_token = response.page_token;
        while let (Some(job), Some(token)) = (job.as_ref(), page_token.take()) {
            tracing::debug!(report = %kind, "📄 Fetching next BigQuery result page");
            let page = self.next_page(job, &token).await?;
            append_rows(&mut table, &columns, page.rows);
            page_token = page.page_token;
        }

        Ok(table)
    }
}

#[async_trait]
impl DataProvider for BigQueryProvider {
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

        if self.config.dry_run_first {
            let bytes = self.estimate_bytes(customer_id, range, kind).await?;
            tracing::info!(report = %kind, bytes, "🧮 BigQuery dry run estimate");
            if bytes > self.config.maximum_bytes_billed {
                return Err(NavError::ProcessingError {
                    message: format!(
                        "Query for {} would scan {} bytes, above the {} byte billing cap",
                        kind, bytes, self.config.maximum_bytes_billed
                    ),
                });
            }
        }

        let sql = sql_for(kind, &self.config.project_id, &self.config.dataset, customer_id);
        let table = self.run_query(kind, &sql, range).await?;
        let data = map_table(kind, &table)?;

        tracing::info!(
            customer_id = %customer_id,
            report = %kind,
            rows = data.len(),
            "📊 BigQuery report fetched"
        );
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MatchType;
    use httpmock::prelude::*;

    fn config(endpoint: String) -> BigQueryConfig {
        BigQueryConfig {
            endpoint,
            project_id: "ads-warehouse".to_string(),
            dataset: "google_ads".to_string(),
            access_token: "ya29.bq".to_string(),
            retry_attempts: 1,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn customer() -> CustomerId {
        CustomerId::new("1234567890").unwrap()
    }

    fn range() -> DateRange {
        DateRange::parse("2026-02-01", "2026-02-28").unwrap()
    }

    #[test]
    fn test_sql_uses_named_date_parameters() {
        let sql = sql_for(ReportKind::Hourly, "p", "d", &customer());
        assert!(sql.contains("`p.d.ads_HourlyCampaignStats_1234567890`"));
        assert!(sql.contains("@start_date AND @end_date"));
        assert!(sql.contains("AS day_of_week"));
    }

    #[tokio::test]
    async fn test_fetch_search_terms_maps_schema() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/projects/ads-warehouse/queries")
                .header("authorization", "Bearer ya29.bq")
                .body_contains("\"useLegacySql\":false")
                .body_contains("\"maximumBytesBilled\":\"10737418240\"")
                .body_contains("ads_SearchQueryStats_1234567890");
            then.status(200).json_body(json!({
                "jobComplete": true,
                "schema": {"fields": [
                    {"name": "campaign"}, {"name": "ad_group"}, {"name": "search_term"},
                    {"name": "keyword"}, {"name": "match_type"}, {"name": "impressions"},
                    {"name": "clicks"}, {"name": "cost_micros"}, {"name": "conversions"},
                    {"name": "conversion_value"}
                ]},
                "rows": [
                    {"f": [{"v": "Shoes"}, {"v": "Running"}, {"v": "free running shoes"}, {"v": "running shoes"},
                           {"v": "BROAD"}, {"v": "120"}, {"v": "12"}, {"v": "18000000"}, {"v": "0"}, {"v": null}]}
                ]
            }));
        });

        let provider = BigQueryProvider::new(config(server.base_url())).unwrap();
        let ReportData::SearchTerms(rows) = provider
            .fetch(&customer(), &range(), ReportKind::SearchTerms)
            .await
            .unwrap()
        else {
            panic!("expected search terms");
        };

        mock.assert();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].search_term, "free running shoes");
        assert_eq!(rows[0].match_type, Some(MatchType::Broad));
        assert_eq!(rows[0].metrics.cost, 18.0);
        assert_eq!(rows[0].metrics.conversion_value, 0.0);
    }

    #[tokio::test]
    async fn test_dry_run_blocks_queries_over_the_cap() {
        let server = MockServer::start();
        let dry_run = server.mock(|when, then| {
            when.method(POST).body_contains("\"dryRun\":true");
            then.status(200).json_body(json!({
                "jobComplete": true,
                "totalBytesProcessed": "99999999999"
            }));
        });

        let provider = BigQueryProvider::new(BigQueryConfig {
            dry_run_first: true,
            maximum_bytes_billed: 1_000_000,
            ..config(server.base_url())
        })
        .unwrap();

        let err = provider
            .fetch(&customer(), &range(), ReportKind::Geo)
            .await
            .unwrap_err();

        dry_run.assert_hits(1);
        assert!(matches!(err, NavError::ProcessingError { .. }));
    }

    #[tokio::test]
    async fn test_estimate_bytes() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).body_contains("\"dryRun\":true");
            then.status(200).json_body(json!({"totalBytesProcessed": "2048"}));
        });

        let provider = BigQueryProvider::new(config(server.base_url())).unwrap();
        let bytes = provider
            .estimate_bytes(&customer(), &range(), ReportKind::Keywords)
            .await
            .unwrap();
        assert_eq!(bytes, 2048);
    }

    #[tokio::test]
    async fn test_incomplete_job_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({"jobComplete": false}));
        });

        let provider = BigQueryProvider::new(config(server.base_url())).unwrap();
        let err = provider
            .fetch(&customer(), &range(), ReportKind::Devices)
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::ProviderError { status: 504, .. }));
    }

    #[tokio::test]
    async fn test_follows_page_tokens() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/projects/ads-warehouse/queries");
            then.status(200).json_body(json!({
                "jobComplete": true,
                "jobReference": {"jobId": "job_1", "location": "US"},
                "pageToken": "page-2",
                "schema": {"fields": [{"name": "campaign"}, {"name": "device"}, {"name": "clicks"}]},
                "rows": [{"f": [{"v": "Shoes"}, {"v": "MOBILE"}, {"v": "10"}]}]
            }));
        });
        let page = server.mock(|when, then| {
            when.method(GET)
                .path("/projects/ads-warehouse/queries/job_1")
                .query_param("pageToken", "page-2")
                .query_param("location", "US");
            then.status(200).json_body(json!({
                "jobComplete": true,
                "rows": [{"f": [{"v": "Shoes"}, {"v": "DESKTOP"}, {"v": "4"}]}]
            }));
        });

        let provider = BigQueryProvider::new(config(server.base_url())).unwrap();
        let data = provider
            .fetch(&customer(), &range(), ReportKind::Devices)
            .await
            .unwrap();

        page.assert();
        assert_eq!(data.len(), 2);
    }
}
