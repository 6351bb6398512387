use crate::adapters::report_table::{parse_number, Field, RawTable};
use crate::domain::model::{
    parse_weekday, CampaignRow, CampaignType, Device, DeviceRow, GeoRow, HourlyRow, KeywordRow,
    MatchType, Metrics, NegativeKeyword, NegativeLevel, ReportData, ReportKind, SearchTermRow,
};
use crate::utils::error::{NavError, Result};
use std::collections::HashMap;

type Row = HashMap<Field, String>;

fn required_fields(kind: ReportKind) -> &'static [Field] {
    match kind {
        ReportKind::Campaigns => &[Field::Campaign],
        ReportKind::SearchTerms => &[Field::SearchTerm, Field::Campaign],
        ReportKind::Keywords => &[Field::Keyword, Field::Campaign],
        ReportKind::NegativeKeywords => &[Field::Keyword],
        ReportKind::Geo => &[Field::Location],
        ReportKind::Hourly => &[Field::DayOfWeek, Field::Hour],
        ReportKind::Devices => &[Field::Device],
    }
}

fn text(row: &Row, field: Field) -> Option<&str> {
    row.get(&field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && *v != "--")
}

fn number(row: &Row, field: Field) -> f64 {
    match row.get(&field) {
        Some(raw) => parse_number(raw).unwrap_or_else(|| {
            tracing::warn!(?field, value = %raw, "⚠️ Unparseable number, using 0");
            0.0
        }),
        None => 0.0,
    }
}

fn count(row: &Row, field: Field) -> u64 {
    number(row, field).max(0.0).round() as u64
}

fn metrics(row: &Row) -> Metrics {
    let cost = if row.contains_key(&Field::Cost) {
        number(row, Field::Cost)
    } else {
        number(row, Field::CostMicros) / 1_000_000.0
    };

    Metrics {
        impressions: count(row, Field::Impressions),
        clicks: count(row, Field::Clicks),
        cost,
        conversions: number(row, Field::Conversions),
        conversion_value: number(row, Field::ConversionValue),
    }
}

/// "+20%" → 0.2，"-100%" → -1.0；不帶 % 的值視為 API 乘數（1.2 → 0.2）
pub fn parse_bid_modifier(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "--" {
        return None;
    }
    let value = parse_number(trimmed)?;
    if trimmed.contains('%') {
        Some(value / 100.0)
    } else {
        Some(value - 1.0)
    }
}

fn parse_level(row: &Row) -> NegativeLevel {
    if let Some(level) = text(row, Field::Level) {
        let lower = level.to_lowercase();
        if lower.contains("shared") || lower.contains("list") || lower.contains("lista") {
            return NegativeLevel::SharedList;
        }
        if lower.contains("ad group") || lower.contains("grupo") || lower.contains("anzeigengruppe")
        {
            return NegativeLevel::AdGroup;
        }
        return NegativeLevel::Campaign;
    }

    if text(row, Field::ListName).is_some() {
        NegativeLevel::SharedList
    } else if text(row, Field::AdGroup).is_some() {
        NegativeLevel::AdGroup
    } else {
        NegativeLevel::Campaign
    }
}

fn keyword_with_match_type(row: &Row) -> (String, MatchType) {
    let raw = text(row, Field::Keyword).unwrap_or_default();
    let (keyword, notation) = MatchType::from_notation(raw);
    let match_type = text(row, Field::MatchType)
        .and_then(MatchType::parse)
        .or(notation)
        .unwrap_or(MatchType::Broad);
    (keyword, match_type)
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

/// 將 RawTable 轉為指定報表的型別化資料列（CSV 與 BigQuery 共用）
pub fn map_table(kind: ReportKind, table: &RawTable) -> Result<ReportData> {
    let missing: Vec<String> = required_fields(kind)
        .iter()
        .filter(|f| !table.has(**f))
        .map(|f| format!("{:?}", f))
        .collect();

    if !missing.is_empty() {
        return Err(NavError::ReportFormatError {
            report: kind.to_string(),
            message: format!("Missing required columns: {}", missing.join(", ")),
        });
    }

    let rows = &table.rows;
    let data = match kind {
        ReportKind::Campaigns => ReportData::Campaigns(
            rows.iter()
                .filter_map(|row| {
                    Some(CampaignRow {
                        campaign: text(row, Field::Campaign)?.to_string(),
                        campaign_type: text(row, Field::CampaignType)
                            .map(CampaignType::parse)
                            .unwrap_or(CampaignType::Search),
                        status: text(row, Field::Status).unwrap_or("enabled").to_lowercase(),
                        daily_budget: text(row, Field::Budget).and_then(parse_number),
                        metrics: metrics(row),
                    })
                })
                .collect(),
        ),
        ReportKind::SearchTerms => ReportData::SearchTerms(
            rows.iter()
                .filter_map(|row| {
                    Some(SearchTermRow {
                        campaign: text(row, Field::Campaign)?.to_string(),
                        ad_group: owned(text(row, Field::AdGroup)),
                        search_term: text(row, Field::SearchTerm)?.to_string(),
                        keyword: text(row, Field::Keyword)
                            .map(|k| MatchType::from_notation(k).0),
                        match_type: text(row, Field::MatchType).and_then(MatchType::parse),
                        metrics: metrics(row),
                    })
                })
                .collect(),
        ),
        ReportKind::Keywords => ReportData::Keywords(
            rows.iter()
                .filter_map(|row| {
                    let campaign = text(row, Field::Campaign)?.to_string();
                    let (keyword, match_type) = keyword_with_match_type(row);
                    if keyword.is_empty() {
                        return None;
                    }
                    Some(KeywordRow {
                        campaign,
                        ad_group: text(row, Field::AdGroup).unwrap_or_default().to_string(),
                        keyword,
                        match_type,
                        status: text(row, Field::Status).unwrap_or("enabled").to_lowercase(),
                        quality_score: text(row, Field::QualityScore)
                            .and_then(parse_number)
                            .filter(|qs| (1.0..=10.0).contains(qs))
                            .map(|qs| qs as u8),
                        max_cpc: text(row, Field::MaxCpc).and_then(parse_number),
                        metrics: metrics(row),
                    })
                })
                .collect(),
        ),
        ReportKind::NegativeKeywords => ReportData::NegativeKeywords(
            rows.iter()
                .filter_map(|row| {
                    let (text_value, match_type) = keyword_with_match_type(row);
                    if text_value.is_empty() {
                        return None;
                    }
                    Some(NegativeKeyword {
                        text: text_value,
                        match_type,
                        level: parse_level(row),
                        campaign: owned(text(row, Field::Campaign)),
                        ad_group: owned(text(row, Field::AdGroup)),
                        list_name: owned(text(row, Field::ListName)),
                    })
                })
                .collect(),
        ),
        ReportKind::Geo => ReportData::Geo(
            rows.iter()
                .filter_map(|row| {
                    Some(GeoRow {
                        campaign: text(row, Field::Campaign).unwrap_or_default().to_string(),
                        location: text(row, Field::Location)?.to_string(),
                        location_type: owned(text(row, Field::LocationType)),
                        bid_modifier: row
                            .get(&Field::BidModifier)
                            .and_then(|v| parse_bid_modifier(v)),
                        metrics: metrics(row),
                    })
                })
                .collect(),
        ),
        ReportKind::Hourly => ReportData::Hourly(
            rows.iter()
                .filter_map(|row| {
                    let day = text(row, Field::DayOfWeek).and_then(parse_weekday);
                    let hour = text(row, Field::Hour)
                        .and_then(parse_number)
                        .filter(|h| (0.0..24.0).contains(h));
                    match (day, hour) {
                        (Some(day_of_week), Some(hour)) => Some(HourlyRow {
                            campaign: text(row, Field::Campaign).unwrap_or_default().to_string(),
                            day_of_week,
                            hour: hour as u8,
                            metrics: metrics(row),
                        }),
                        _ => {
                            tracing::warn!("⚠️ Skipping hourly row with invalid day/hour: {:?}", row);
                            None
                        }
                    }
                })
                .collect(),
        ),
        ReportKind::Devices => ReportData::Devices(
            rows.iter()
                .filter_map(|row| {
                    Some(DeviceRow {
                        campaign: text(row, Field::Campaign).unwrap_or_default().to_string(),
                        device: Device::parse(text(row, Field::Device)?),
                        bid_modifier: row
                            .get(&Field::BidModifier)
                            .and_then(|v| parse_bid_modifier(v)),
                        metrics: metrics(row),
                    })
                })
                .collect(),
        ),
    };

    Ok(data)
}
