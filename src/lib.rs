pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod i18n;
pub mod security;
pub mod utils;

#[cfg(feature = "server")]
pub mod api;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "cli")]
pub use config::CliConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

pub use app::AnalyzerRegistry;
pub use config::{cli::LocalStorage, NavConfig};
pub use core::{AuditRequest, AuditService};
pub use utils::error::{NavError, Result};
