pub mod audit;
pub mod repository;

pub use audit::{AuditRequest, AuditService, AuditSettings, RecommendationFilter};
pub use repository::Repository;
