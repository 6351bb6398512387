use crate::adapters::storage::ObjectPath;
use crate::domain::model::{AuditReport, Recommendation};
use crate::domain::ports::{Exporter, Storage};
use crate::utils::error::{NavError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

const CSV_HEADERS: [&str; 9] = [
    "analyzer",
    "priority",
    "kind",
    "entity",
    "campaign",
    "title",
    "description",
    "estimated_savings",
    "estimated_conversion_gain",
];

fn optional_amount(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn recommendations_csv<'a>(
    rows: impl Iterator<Item = (&'a str, &'a Recommendation)>,
) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;

    for (analyzer, rec) in rows {
        let savings = optional_amount(rec.estimated_savings);
        let gain = optional_amount(rec.estimated_conversion_gain);
        writer.write_record([
            analyzer,
            rec.priority.as_str(),
            rec.kind.as_str(),
            rec.entity.as_str(),
            rec.campaign.as_deref().unwrap_or_default(),
            rec.title.as_str(),
            rec.description.as_str(),
            savings.as_str(),
            gain.as_str(),
        ])?;
    }

    writer.into_inner().map_err(|e| NavError::ProcessingError {
        message: format!("Failed to flush CSV output: {}", e),
    })
}

/// 每筆建議一列
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn format(&self) -> &'static str {
        "csv"
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }

    fn file_name(&self) -> String {
        "recommendations.csv".to_string()
    }

    fn export(&self, report: &AuditReport) -> Result<Vec<u8>> {
        recommendations_csv(report.recommendations())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn export(&self, report: &AuditReport) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(report)?)
    }
}

/// recommendations.csv + audit.json + 每個分析器一個 CSV
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipBundleExporter;

impl Exporter for ZipBundleExporter {
    fn format(&self) -> &'static str {
        "zip"
    }

    fn file_extension(&self) -> &'static str {
        "zip"
    }

    fn export(&self, report: &AuditReport) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

        zip.start_file::<_, ()>("recommendations.csv", FileOptions::default())?;
        zip.write_all(&CsvExporter.export(report)?)?;

        zip.start_file::<_, ()>("audit.json", FileOptions::default())?;
        zip.write_all(&JsonExporter.export(report)?)?;

        for result in &report.results {
            zip.start_file::<_, ()>(format!("{}.csv", result.analyzer), FileOptions::default())?;
            let rows = result
                .recommendations
                .iter()
                .map(|rec| (result.analyzer.as_str(), rec));
            zip.write_all(&recommendations_csv(rows)?)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

pub fn exporter_for(format: &str) -> Result<Box<dyn Exporter>> {
    match format.trim().to_lowercase().as_str() {
        "csv" => Ok(Box::new(CsvExporter)),
        "json" => Ok(Box::new(JsonExporter)),
        "zip" => Ok(Box::new(ZipBundleExporter)),
        other => Err(NavError::validation(format!(
            "Unsupported export format '{}' (expected csv, json or zip)",
            other
        ))),
    }
}

/// 依序輸出各格式，回傳寫入的物件路徑
pub async fn export_report<S: Storage>(
    storage: &S,
    report: &AuditReport,
    formats: &[String],
    prefix: &str,
) -> Result<Vec<String>> {
    let path = ObjectPath::for_audit(prefix, report);
    let mut written = Vec::with_capacity(formats.len());

    for format in formats {
        let exporter = exporter_for(format)?;
        let data = exporter.export(report)?;
        let key = path.file(&exporter.file_name());
        storage.write_file(&key, &data).await?;
        tracing::info!(audit_id = %report.id, bytes = data.len(), "💾 Exported {}", key);
        written.push(key);
    }

    Ok(written)
}
