use crate::adapters::report_table::parse_report;
use crate::adapters::row_mapping::map_table;
use crate::domain::model::{CustomerId, DateRange, ReportData, ReportKind};
use crate::domain::ports::{DataProvider, Storage};
use crate::utils::error::{NavError, Result};
use async_trait::async_trait;

/// 讀取 Google Ads 介面匯出的 CSV/TSV 報表
///
/// 依序尋找 `{customer_id}/{stem}.csv`、`{customer_id}/{stem}.tsv`、`{stem}.csv`、`{stem}.tsv`。
/// 匯出檔本身已依日期篩選，因此不再以日期範圍過濾。
pub struct CsvReportProvider<S: Storage> {
    storage: S,
}

impl<S: Storage> CsvReportProvider<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    fn candidates(customer_id: &CustomerId, kind: ReportKind) -> Vec<String> {
        let stem = kind.file_stem();
        vec![
            format!("{}/{}.csv", customer_id.as_str(), stem),
            format!("{}/{}.tsv", customer_id.as_str(), stem),
            format!("{}.csv", stem),
            format!("{}.tsv", stem),
        ]
    }
}

fn is_missing(error: &NavError) -> bool {
    match error {
        NavError::NotFound { .. } => true,
        NavError::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

#[async_trait]
impl<S: Storage> DataProvider for CsvReportProvider<S> {
    fn name(&self) -> &str {
        "csv"
    }

    async fn fetch(
        &self,
        customer_id: &CustomerId,
        range: &DateRange,
        kind: ReportKind,
    ) -> Result<ReportData> {
        for path in Self::candidates(customer_id, kind) {
            let bytes = match self.storage.read_file(&path).await {
                Ok(bytes) => bytes,
                Err(e) if is_missing(&e) => continue,
                Err(e) => return Err(e),
            };

            let table = parse_report(kind.file_stem(), &bytes)?;
            let data = map_table(kind, &table)?;
            tracing::info!(
                customer_id = %customer_id,
                report = %kind,
                rows = data.len(),
                "📄 Loaded {} ({})",
                path,
                range
            );
            return Ok(data);
        }

        Err(NavError::not_found("report", format!("{}.csv", kind.file_stem())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use tempfile::TempDir;

    fn range() -> DateRange {
        DateRange::parse("2026-03-01", "2026-03-31").unwrap()
    }

    #[tokio::test]
    async fn test_prefers_customer_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("1234567890")).unwrap();
        std::fs::write(
            dir.path().join("1234567890/devices.csv"),
            "Device,Campaign,Clicks,Cost\nMobile phones,Shoes,10,5.00\nComputers,Shoes,4,3.00\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("devices.csv"), "Device,Campaign\nTablets,Other\n").unwrap();

        let provider = CsvReportProvider::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
        let customer = CustomerId::new("123-456-7890").unwrap();
        let data = provider.fetch(&customer, &range(), ReportKind::Devices).await.unwrap();
        assert_eq!(data.len(), 2);
    }

    #[tokio::test]
    async fn test_reads_tsv_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("geo.tsv"),
            "Location\tCampaign\tClicks\tCost\tConversions\nMadrid\tShoes\t12\t30.00\t1\n",
        )
        .unwrap();

        let provider = CsvReportProvider::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
        let customer = CustomerId::new("1234567890").unwrap();
        let ReportData::Geo(rows) = provider.fetch(&customer, &range(), ReportKind::Geo).await.unwrap()
        else {
            panic!("expected geo rows");
        };
        assert_eq!(rows[0].location, "Madrid");
        assert_eq!(rows[0].metrics.cost, 30.0);
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let dir = TempDir::new().unwrap();
        let provider = CsvReportProvider::new(LocalStorage::new(dir.path().to_string_lossy().to_string()));
        let customer = CustomerId::new("1234567890").unwrap();

        let err = provider
            .fetch(&customer, &range(), ReportKind::Hourly)
            .await
            .unwrap_err();
        assert!(matches!(err, NavError::NotFound { .. }));

        let snapshot = provider
            .fetch_snapshot(&customer, &range(), &[ReportKind::Hourly, ReportKind::Geo], 2)
            .await
            .unwrap();
        assert!(snapshot.hourly.is_empty());
        assert!(snapshot.geo.is_empty());
    }
}
