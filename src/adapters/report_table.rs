use crate::utils::error::{NavError, Result};
use std::collections::HashMap;

/// 報表欄位的標準名稱；不同語系、不同來源的欄名都對應到這裡
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Campaign,
    CampaignType,
    AdGroup,
    SearchTerm,
    Keyword,
    MatchType,
    Status,
    QualityScore,
    MaxCpc,
    Level,
    ListName,
    Location,
    LocationType,
    BidModifier,
    DayOfWeek,
    Hour,
    Device,
    Budget,
    Impressions,
    Clicks,
    Cost,
    CostMicros,
    Conversions,
    ConversionValue,
}

const ALIASES: &[(&str, Field)] = &[
    // campaign
    ("campaign", Field::Campaign),
    ("campaign name", Field::Campaign),
    ("campaña", Field::Campaign),
    ("kampagne", Field::Campaign),
    ("campagne", Field::Campaign),
    ("campaign type", Field::CampaignType),
    ("advertising channel type", Field::CampaignType),
    ("campaign advertising channel type", Field::CampaignType),
    ("tipo de campaña", Field::CampaignType),
    ("kampagnentyp", Field::CampaignType),
    ("type de campagne", Field::CampaignType),
    // ad group
    ("ad group", Field::AdGroup),
    ("ad group name", Field::AdGroup),
    ("grupo de anuncios", Field::AdGroup),
    ("anzeigengruppe", Field::AdGroup),
    ("groupe d annonces", Field::AdGroup),
    // search term / keyword
    ("search term", Field::SearchTerm),
    ("search terms", Field::SearchTerm),
    ("search term view search term", Field::SearchTerm),
    ("término de búsqueda", Field::SearchTerm),
    ("termino de busqueda", Field::SearchTerm),
    ("suchbegriff", Field::SearchTerm),
    ("terme de recherche", Field::SearchTerm),
    ("keyword", Field::Keyword),
    ("keywords", Field::Keyword),
    ("keyword text", Field::Keyword),
    ("negative keyword", Field::Keyword),
    ("negative keywords", Field::Keyword),
    ("palabra clave", Field::Keyword),
    ("palabra clave negativa", Field::Keyword),
    ("mot clé", Field::Keyword),
    ("mot clé négatif", Field::Keyword),
    ("match type", Field::MatchType),
    ("keyword match type", Field::MatchType),
    ("tipo de concordancia", Field::MatchType),
    ("übereinstimmungstyp", Field::MatchType),
    ("type de correspondance", Field::MatchType),
    ("status", Field::Status),
    ("keyword status", Field::Status),
    ("campaign status", Field::Status),
    ("estado", Field::Status),
    ("statut", Field::Status),
    ("quality score", Field::QualityScore),
    ("qual score", Field::QualityScore),
    ("nivel de calidad", Field::QualityScore),
    ("qualitätsfaktor", Field::QualityScore),
    ("niveau de qualité", Field::QualityScore),
    ("max cpc", Field::MaxCpc),
    ("default max cpc", Field::MaxCpc),
    ("cpc máx", Field::MaxCpc),
    ("cpc max", Field::MaxCpc),
    // negatives
    ("level", Field::Level),
    ("negative keyword level", Field::Level),
    ("nivel", Field::Level),
    ("ebene", Field::Level),
    ("niveau", Field::Level),
    ("list name", Field::ListName),
    ("shared set", Field::ListName),
    ("negative keyword list", Field::ListName),
    ("nombre de la lista", Field::ListName),
    // geo
    ("location", Field::Location),
    ("target location", Field::Location),
    ("matched location", Field::Location),
    ("country territory", Field::Location),
    ("ubicación", Field::Location),
    ("standort", Field::Location),
    ("emplacement", Field::Location),
    ("location type", Field::LocationType),
    ("tipo de ubicación", Field::LocationType),
    ("bid adj", Field::BidModifier),
    ("bid adjustment", Field::BidModifier),
    ("bid modifier", Field::BidModifier),
    ("ajuste de la puja", Field::BidModifier),
    ("gebotsanpassung", Field::BidModifier),
    ("ajustement des enchères", Field::BidModifier),
    // schedule
    ("day of week", Field::DayOfWeek),
    ("day of the week", Field::DayOfWeek),
    ("día de la semana", Field::DayOfWeek),
    ("wochentag", Field::DayOfWeek),
    ("jour de la semaine", Field::DayOfWeek),
    ("hour of day", Field::Hour),
    ("hour", Field::Hour),
    ("hora del día", Field::Hour),
    ("hora", Field::Hour),
    ("stunde", Field::Hour),
    ("heure", Field::Hour),
    // device
    ("device", Field::Device),
    ("dispositivo", Field::Device),
    ("gerät", Field::Device),
    ("appareil", Field::Device),
    // budget / metrics
    ("budget", Field::Budget),
    ("daily budget", Field::Budget),
    ("budget amount", Field::Budget),
    ("presupuesto", Field::Budget),
    ("impressions", Field::Impressions),
    ("impr", Field::Impressions),
    ("impresiones", Field::Impressions),
    ("impressionen", Field::Impressions),
    ("clicks", Field::Clicks),
    ("clics", Field::Clicks),
    ("klicks", Field::Clicks),
    ("cost", Field::Cost),
    ("costo", Field::Cost),
    ("coste", Field::Cost),
    ("kosten", Field::Cost),
    ("coût", Field::Cost),
    ("cost micros", Field::CostMicros),
    ("metrics cost micros", Field::CostMicros),
    ("conversions", Field::Conversions),
    ("conv", Field::Conversions),
    ("conversiones", Field::Conversions),
    ("konversionen", Field::Conversions),
    ("conv value", Field::ConversionValue),
    ("conversion value", Field::ConversionValue),
    ("conversions value", Field::ConversionValue),
    ("total conv value", Field::ConversionValue),
    ("valor de conv", Field::ConversionValue),
    ("valor de conversión", Field::ConversionValue),
    ("konv wert", Field::ConversionValue),
    ("valeur de conv", Field::ConversionValue),
];

/// 去除 `(USD)` 等括號註記、標點與多餘空白後轉小寫
fn normalize_header(header: &str) -> String {
    let mut without_parens = String::with_capacity(header.len());
    let mut depth = 0usize;
    for ch in header.trim_start_matches('\u{feff}').chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_parens.push(ch),
            _ => {}
        }
    }

    without_parens
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn canonical_field(header: &str) -> Option<Field> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, field)| *field)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<Field>,
    pub rows: Vec<HashMap<Field, String>>,
}

impl RawTable {
    pub fn has(&self, field: Field) -> bool {
        self.headers.contains(&field)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 支援 UTF-8（含 BOM）與帶 BOM 的 UTF-16LE/BE（Google Ads「CSV for Excel」匯出）
pub fn decode_report_bytes(bytes: &[u8]) -> Result<String> {
    let utf16 = |le: bool| -> Result<String> {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| {
                if le {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|e| NavError::ReportFormatError {
            report: "input".to_string(),
            message: format!("Invalid UTF-16 data: {}", e),
        })
    };

    match bytes {
        [0xFF, 0xFE, ..] => utf16(true),
        [0xFE, 0xFF, ..] => utf16(false),
        [0xEF, 0xBB, 0xBF, rest @ ..] => Ok(String::from_utf8_lossy(rest).into_owned()),
        _ => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

pub fn detect_delimiter(text: &str) -> u8 {
    let (tabs, commas) = text.lines().take(10).fold((0usize, 0usize), |(t, c), line| {
        (
            t + line.matches('\t').count(),
            c + line.matches(',').count(),
        )
    });
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

/// 合計列："Total"、"Total: Account"、"Total - Search"、"Gesamt: Konto"；
/// "total gym equipment" 之類以 total 開頭的字詞不算
fn is_total_label(cell: &str) -> bool {
    let label = cell.trim().to_lowercase();
    ["total", "gesamt"].iter().any(|word| match label.strip_prefix(word) {
        Some("") => true,
        Some(rest) => {
            rest.trim_start().starts_with(':') || rest.starts_with(" -") || rest.starts_with(" –")
        }
        None => false,
    })
}

fn is_total_row(cells: &[String]) -> bool {
    cells
        .iter()
        .find(|c| !c.trim().is_empty())
        .map(|first| is_total_label(first))
        .unwrap_or(false)
}

/// 解析 Google Ads 報表：略過標題與日期前言、找出欄位列、略過合計列
pub fn parse_report(report: &str, bytes: &[u8]) -> Result<RawTable> {
    let text = decode_report_bytes(bytes)?;
    let delimiter = detect_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut records: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(|c| c.to_string()).collect());
    }

    let header_index = records
        .iter()
        .position(|cells| cells.iter().filter_map(|c| canonical_field(c)).count() >= 2)
        .ok_or_else(|| NavError::ReportFormatError {
            report: report.to_string(),
            message: "No recognizable header row found".to_string(),
        })?;

    let columns: Vec<Option<Field>> = records[header_index]
        .iter()
        .map(|c| canonical_field(c))
        .collect();
    tracing::debug!(report, header_row = header_index, "🧭 Header row detected: {:?}", records[header_index]);

    let mut table = RawTable {
        headers: columns.iter().flatten().copied().collect(),
        rows: Vec::new(),
    };

    for cells in records.into_iter().skip(header_index + 1) {
        if cells.iter().all(|c| c.trim().is_empty()) || is_total_row(&cells) {
            continue;
        }

        let mut row = HashMap::new();
        for (field, value) in columns.iter().zip(cells) {
            if let Some(field) = field {
                row.entry(*field).or_insert(value);
            }
        }
        table.rows.push(row);
    }

    Ok(table)
}

/// 解析報表數值：`$1,234.56`、`1.234,56 €`、`12.5%`、`< 10%`；`--` 與空白為 0
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '-' || c == '—' || c == ' ') {
        return Some(0.0);
    }

    let negative = trimmed.starts_with('-') || (trimmed.starts_with('(') && trimmed.ends_with(')'));
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if cleaned.matches(',').count() == 1 && decimals != 3 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .map(|v| if negative { -v } else { v })
}
