use crate::domain::model::{AuditReport, CustomerId};
use chrono::NaiveDate;
use uuid::Uuid;

pub use crate::config::cli::LocalStorage;
#[cfg(feature = "lambda")]
pub use crate::config::lambda::S3Storage;

/// 稽核輸出的物件路徑：`{prefix}/customers/{customer_id}/audits/{YYYY-MM-DD}/{audit_id}/{file}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPath {
    prefix: String,
    customer_id: CustomerId,
    date: NaiveDate,
    audit_id: Uuid,
}

impl ObjectPath {
    pub fn new(prefix: &str, customer_id: CustomerId, date: NaiveDate, audit_id: Uuid) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            customer_id,
            date,
            audit_id,
        }
    }

    pub fn for_audit(prefix: &str, report: &AuditReport) -> Self {
        Self::new(
            prefix,
            report.customer_id.clone(),
            report.started_at.date_naive(),
            report.id,
        )
    }

    /// 列出某客戶所有稽核用的前綴
    pub fn customer_prefix(prefix: &str, customer_id: &CustomerId) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("customers/{}/audits", customer_id.as_str())
        } else {
            format!("{}/customers/{}/audits", prefix, customer_id.as_str())
        }
    }

    pub fn dir(&self) -> String {
        format!(
            "{}/{}/{}",
            Self::customer_prefix(&self.prefix, &self.customer_id),
            self.date.format("%Y-%m-%d"),
            self.audit_id
        )
    }

    pub fn file(&self, name: &str) -> String {
        format!("{}/{}", self.dir(), name.trim_start_matches('/'))
    }

    /// 從物件路徑取回稽核 ID（`.../audits/{date}/{audit_id}/{file}`）
    pub fn audit_id_from_key(key: &str) -> Option<Uuid> {
        let mut parts = key.rsplit('/');
        let _file = parts.next()?;
        let id = parts.next()?;
        let date = parts.next()?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        Uuid::parse_str(id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_layout() {
        let id = Uuid::parse_str("6f1c2d3e-4b5a-4c6d-8e7f-0a1b2c3d4e5f").unwrap();
        let path = ObjectPath::new(
            "/exports/",
            CustomerId::new("123-456-7890").unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            id,
        );

        let key = path.file("audit.json");
        assert_eq!(
            key,
            "exports/customers/1234567890/audits/2026-04-02/6f1c2d3e-4b5a-4c6d-8e7f-0a1b2c3d4e5f/audit.json"
        );
        assert_eq!(ObjectPath::audit_id_from_key(&key), Some(id));
        assert_eq!(ObjectPath::audit_id_from_key("exports/readme.txt"), None);
    }

    #[test]
    fn test_empty_prefix_has_no_leading_slash() {
        let customer = CustomerId::new("1234567890").unwrap();
        assert_eq!(
            ObjectPath::customer_prefix("", &customer),
            "customers/1234567890/audits"
        );
    }
}
