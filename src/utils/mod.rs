pub mod cache;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod pagination;
pub mod rate_limit;
pub mod validation;
