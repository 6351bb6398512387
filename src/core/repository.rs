use crate::domain::model::{AuditReport, Customer, CustomerId};
use crate::utils::error::{NavError, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 客戶與稽核紀錄的記憶體儲存
#[derive(Default)]
pub struct Repository {
    customers: RwLock<HashMap<CustomerId, Customer>>,
    audits: RwLock<HashMap<Uuid, AuditReport>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回傳 true 表示新增，false 表示更新
    pub async fn upsert_customer(&self, customer: Customer) -> bool {
        let mut customers = self.customers.write().await;
        let created = !customers.contains_key(&customer.id);
        customers.insert(customer.id.clone(), customer);
        created
    }

    pub async fn get_customer(&self, id: &CustomerId) -> Result<Customer> {
        self.customers
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| NavError::not_found("Customer", id.to_string()))
    }

    pub async fn list_customers(&self) -> Vec<Customer> {
        let mut customers: Vec<Customer> = self.customers.read().await.values().cloned().collect();
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        customers
    }

    /// 一次讀鎖完成批次查詢，結果依請求順序，找不到為 None
    pub async fn load_customers(&self, ids: &[CustomerId]) -> Vec<Option<Customer>> {
        let customers = self.customers.read().await;
        ids.iter().map(|id| customers.get(id).cloned()).collect()
    }

    pub async fn insert_audit(&self, audit: AuditReport) {
        self.audits.write().await.insert(audit.id, audit);
    }

    pub async fn update_audit(&self, audit: AuditReport) -> Result<()> {
        let mut audits = self.audits.write().await;
        match audits.get_mut(&audit.id) {
            Some(existing) => {
                *existing = audit;
                Ok(())
            }
            None => Err(NavError::not_found("Audit", audit.id.to_string())),
        }
    }

    pub async fn get_audit(&self, id: Uuid) -> Result<AuditReport> {
        self.audits
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| NavError::not_found("Audit", id.to_string()))
    }

    /// 最新的在前
    pub async fn list_audits(&self, customer_id: &CustomerId) -> Vec<AuditReport> {
        let mut audits: Vec<AuditReport> = self
            .audits
            .read()
            .await
            .values()
            .filter(|a| &a.customer_id == customer_id)
            .cloned()
            .collect();
        audits.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));
        audits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AuditStatus, DateRange};
    use chrono::Duration;

    fn customer(id: &str) -> Customer {
        Customer::new(CustomerId::new(id).unwrap(), format!("Customer {}", id))
    }

    #[tokio::test]
    async fn test_customer_upsert_and_batch_load() {
        let repo = Repository::new();
        assert!(repo.upsert_customer(customer("1111111111")).await);
        assert!(repo.upsert_customer(customer("2222222222")).await);

        let mut renamed = customer("1111111111");
        renamed.name = "Acme".to_string();
        assert!(!repo.upsert_customer(renamed).await);

        let ids = [
            CustomerId::new("2222222222").unwrap(),
            CustomerId::new("3333333333").unwrap(),
            CustomerId::new("1111111111").unwrap(),
        ];
        let loaded = repo.load_customers(&ids).await;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].as_ref().unwrap().id, ids[0]);
        assert!(loaded[1].is_none());
        assert_eq!(loaded[2].as_ref().unwrap().name, "Acme");

        assert_eq!(repo.list_customers().await.len(), 2);
        assert!(matches!(
            repo.get_customer(&ids[1]).await,
            Err(NavError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_audits_newest_first() {
        let repo = Repository::new();
        let customer_id = CustomerId::new("1234567890").unwrap();
        let range = DateRange::parse("2026-01-01", "2026-01-31").unwrap();

        let mut older = AuditReport::start(customer_id.clone(), range);
        older.started_at -= Duration::hours(2);
        let newer = AuditReport::start(customer_id.clone(), range);
        let other = AuditReport::start(CustomerId::new("9999999999").unwrap(), range);

        repo.insert_audit(older.clone()).await;
        repo.insert_audit(newer.clone()).await;
        repo.insert_audit(other).await;

        let listed = repo.list_audits(&customer_id).await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);

        let mut done = older.clone();
        done.status = AuditStatus::Completed;
        repo.update_audit(done).await.unwrap();
        assert_eq!(repo.get_audit(older.id).await.unwrap().status, AuditStatus::Completed);

        let missing = AuditReport::start(customer_id, range);
        assert!(repo.update_audit(missing).await.is_err());
    }
}
