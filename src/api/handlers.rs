use super::middleware::bearer_token;
use super::response::RequestTimer;
use super::AppState;
use crate::core::audit::{AuditRequest, RecommendationFilter};
use crate::domain::model::{AuditReport, AuditStatus, Customer, CustomerId, DateRange, Priority};
use crate::security::Claims;
use crate::utils::error::{NavError, Result};
use crate::utils::pagination::PageRequest;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SCOPE_READ: &str = "audits:read";
const SCOPE_WRITE: &str = "audits:write";

/// 簽發給 API key 的權限
const API_KEY_SCOPES: [&str; 2] = [SCOPE_READ, SCOPE_WRITE];

fn require_scope(claims: &Claims, scope: &str) -> Result<()> {
    if claims.has_scope(scope) {
        Ok(())
    } else {
        tracing::warn!(sub = %claims.sub, scope, "🚫 Token lacks required scope");
        Err(NavError::Forbidden {
            message: format!("token lacks the '{}' scope", scope),
        })
    }
}

fn parse_audit_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| NavError::validation(format!("Invalid audit id '{}'", raw)))
}

pub async fn health(State(state): State<AppState>, Extension(timer): Extension<RequestTimer>) -> Response {
    timer.ok(
        StatusCode::OK,
        serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "analyzers": state.audits.registry().names().len(),
        }),
    )
}

pub async fn issue_token(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    headers: HeaderMap,
) -> Response {
    let result = (|| {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| NavError::AuthError {
                message: "missing X-API-Key header".to_string(),
            })?;
        let index = state
            .api_keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| NavError::AuthError {
                message: "invalid API key".to_string(),
            })?;

        let scopes: Vec<String> = API_KEY_SCOPES.iter().map(|s| s.to_string()).collect();
        state.jwt.issue(&format!("api-key-{}", index + 1), &scopes)
    })();
    timer.respond(StatusCode::CREATED, result)
}

#[derive(Debug, Serialize)]
struct Revoked {
    jti: String,
    revoked: bool,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    headers: HeaderMap,
) -> Response {
    let result = bearer_token(&headers)
        .ok_or_else(|| NavError::AuthError {
            message: "missing bearer token".to_string(),
        })
        .and_then(|token| state.jwt.revoke(token))
        .map(|claims| Revoked {
            jti: claims.jti,
            revoked: true,
        });
    timer.respond(StatusCode::OK, result)
}

pub async fn list_customers(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    let customers = state.audits.repository().list_customers().await;
    timer.ok(StatusCode::OK, customers)
}

#[derive(Debug, Deserialize)]
pub struct CustomerBody {
    pub customer_id: String,
    pub name: String,
    #[serde(default)]
    pub manager_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl CustomerBody {
    fn into_customer(self) -> Result<Customer> {
        if self.name.trim().is_empty() {
            return Err(NavError::validation("Customer name cannot be empty"));
        }
        let mut customer = Customer::new(CustomerId::new(&self.customer_id)?, self.name.trim());
        customer.manager_id = self.manager_id.as_deref().map(CustomerId::new).transpose()?;
        if let Some(currency) = self.currency {
            customer.currency = currency.trim().to_uppercase();
        }
        if let Some(locale) = self.locale {
            customer.locale = locale;
        }
        Ok(customer)
    }
}

pub async fn upsert_customer(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CustomerBody>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_WRITE) {
        return timer.error(&e);
    }
    let customer = match body.into_customer() {
        Ok(customer) => customer,
        Err(e) => return timer.error(&e),
    };
    let created = state.audits.repository().upsert_customer(customer.clone()).await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    timer.ok(status, customer)
}

pub async fn get_customer(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    let result = match CustomerId::new(&id) {
        Ok(id) => state.audits.repository().get_customer(&id).await,
        Err(e) => Err(e),
    };
    timer.respond(StatusCode::OK, result)
}

/// 稽核清單用的精簡資料
#[derive(Debug, Serialize)]
pub struct AuditSummary {
    pub id: Uuid,
    pub status: AuditStatus,
    pub date_range: DateRange,
    pub recommendations: usize,
    pub estimated_savings: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&AuditReport> for AuditSummary {
    fn from(report: &AuditReport) -> Self {
        Self {
            id: report.id,
            status: report.status,
            date_range: report.date_range,
            recommendations: report.total_recommendations(),
            estimated_savings: (report.total_estimated_savings() * 100.0).round() / 100.0,
            started_at: report.started_at,
            finished_at: report.finished_at,
        }
    }
}

pub async fn list_customer_audits(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    let result = match CustomerId::new(&id) {
        Ok(id) => state
            .audits
            .list_audits(&id)
            .await
            .map(|audits| audits.iter().map(AuditSummary::from).collect::<Vec<_>>()),
        Err(e) => Err(e),
    };
    timer.respond(StatusCode::OK, result)
}

pub async fn list_analyzers(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    timer.ok(StatusCode::OK, state.audits.registry().describe())
}

/// 指定 start_date / end_date，或以 days 表示截至昨天的天數
#[derive(Debug, Deserialize)]
pub struct CreateAuditBody {
    pub customer_id: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub analyzers: Vec<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl CreateAuditBody {
    pub fn into_request(self, default_days: u32) -> Result<AuditRequest> {
        let customer_id = CustomerId::new(&self.customer_id)?;
        let date_range = match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => DateRange::parse(start, end)?,
            (None, None) => DateRange::last_n_days(
                self.days.unwrap_or(default_days),
                Utc::now().date_naive(),
            )?,
            _ => {
                return Err(NavError::validation(
                    "start_date and end_date must be given together",
                ))
            }
        };

        let mut request = AuditRequest::new(customer_id, date_range).with_analyzers(self.analyzers);
        if let Some(locale) = self.locale {
            request = request.with_locale(locale);
        }
        Ok(request)
    }
}

pub async fn create_audit(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CreateAuditBody>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_WRITE) {
        return timer.error(&e);
    }
    let request = match body.into_request(state.default_days) {
        Ok(request) => request,
        Err(e) => return timer.error(&e),
    };
    let result = state.audits.run_audit(request).await;
    timer.respond(StatusCode::CREATED, result)
}

pub async fn get_audit(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    let result = match parse_audit_id(&id) {
        Ok(id) => state.audits.get_audit(id).await,
        Err(e) => Err(e),
    };
    timer.respond(StatusCode::OK, result)
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub min_priority: Option<String>,
    pub analyzer: Option<String>,
}

impl RecommendationQuery {
    fn split(self) -> Result<(RecommendationFilter, PageRequest)> {
        let min_priority = self
            .min_priority
            .as_deref()
            .map(|raw| {
                Priority::parse(raw).ok_or_else(|| {
                    NavError::validation(format!(
                        "Invalid min_priority '{}'. Expected critical, high, medium or low",
                        raw
                    ))
                })
            })
            .transpose()?;
        let defaults = PageRequest::default();
        let page = PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
        );
        let filter = RecommendationFilter {
            min_priority,
            analyzer: self.analyzer.filter(|a| !a.trim().is_empty()),
        };
        Ok((filter, page))
    }
}

pub async fn audit_recommendations(
    State(state): State<AppState>,
    Extension(timer): Extension<RequestTimer>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(query): Query<RecommendationQuery>,
) -> Response {
    if let Err(e) = require_scope(&claims, SCOPE_READ) {
        return timer.error(&e);
    }
    let parsed = parse_audit_id(&id).and_then(|id| query.split().map(|(f, p)| (id, f, p)));
    let result = match parsed {
        Ok((id, filter, page)) => state.audits.recommendations(id, &filter, page).await,
        Err(e) => Err(e),
    };
    timer.respond(StatusCode::OK, result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_audit_body_date_handling() {
        let body = CreateAuditBody {
            customer_id: "123-456-7890".to_string(),
            start_date: Some("2026-01-01".to_string()),
            end_date: Some("2026-01-31".to_string()),
            days: None,
            analyzers: vec!["geo_performance".to_string()],
            locale: Some("es".to_string()),
        };
        let request = body.into_request(30).unwrap();
        assert_eq!(request.customer_id.as_str(), "1234567890");
        assert_eq!(request.date_range.days(), 31);
        assert_eq!(request.locale.as_deref(), Some("es"));

        let half = CreateAuditBody {
            customer_id: "1234567890".to_string(),
            start_date: Some("2026-01-01".to_string()),
            end_date: None,
            days: None,
            analyzers: vec![],
            locale: None,
        };
        assert!(matches!(half.into_request(30), Err(NavError::ValidationError { .. })));

        let by_days = CreateAuditBody {
            customer_id: "1234567890".to_string(),
            start_date: None,
            end_date: None,
            days: Some(7),
            analyzers: vec![],
            locale: None,
        };
        assert_eq!(by_days.into_request(30).unwrap().date_range.days(), 7);
    }

    #[test]
    fn test_recommendation_query_rejects_bad_priority() {
        let query = RecommendationQuery {
            min_priority: Some("urgent".to_string()),
            ..Default::default()
        };
        assert!(query.split().is_err());

        let query = RecommendationQuery {
            page: Some(0),
            per_page: Some(1000),
            min_priority: Some("HIGH".to_string()),
            analyzer: Some(" ".to_string()),
        };
        let (filter, page) = query.split().unwrap();
        assert_eq!(filter.min_priority, Some(Priority::High));
        assert!(filter.analyzer.is_none());
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 100);
    }
}
