pub mod cli;
pub mod lambda;
pub mod thresholds;
pub mod toml_config;

pub use thresholds::ThresholdConfig;
pub use toml_config::{NavConfig, ProviderKind};

#[cfg(feature = "cli")]
use crate::domain::model::DateRange;
#[cfg(feature = "cli")]
use crate::utils::error::{NavError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{normalize_customer_id, validate_range, Validate};
#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};
#[cfg(feature = "cli")]
use toml_config::SUPPORTED_EXPORT_FORMATS;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "paid-search-nav")]
#[command(about = "Audit Google Ads accounts and produce prioritized recommendations")]
#[command(version)]
pub struct CliConfig {
    /// TOML 設定檔
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// csv, google_ads, bigquery or mock
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// en or es
    #[arg(long, global = true)]
    pub locale: Option<String>,

    #[arg(long, global = true, help = "Log CPU and memory usage per audit phase")]
    pub monitor: bool,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run an audit for one customer
    Audit(AuditArgs),
    /// List the available analyzers
    Analyzers,
    /// Start the HTTP API
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Start the MCP server on stdio
    Mcp,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct AuditArgs {
    #[arg(long)]
    pub customer_id: String,

    /// YYYY-MM-DD
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// YYYY-MM-DD
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// 截至昨天的天數（未指定日期時使用）
    #[arg(long, conflicts_with_all = ["start", "end"])]
    pub days: Option<u32>,

    #[arg(long, value_delimiter = ',')]
    pub analyzers: Vec<String>,

    /// csv, json, zip
    #[arg(long, value_delimiter = ',')]
    pub format: Vec<String>,

    #[arg(long)]
    pub output: Option<String>,

    /// CSV 報表目錄（覆蓋設定檔的 provider.csv.input_dir）
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long, help = "Print the audit plan without fetching data")]
    pub dry_run: bool,
}

#[cfg(feature = "cli")]
impl AuditArgs {
    pub fn date_range(&self, default_days: u32, today: NaiveDate) -> Result<DateRange> {
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => DateRange::parse(start, end),
            (None, None) => DateRange::last_n_days(self.days.unwrap_or(default_days), today),
            _ => Err(NavError::validation("--start and --end must be given together")),
        }
    }
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入設定檔並套用命令列覆蓋值
    pub fn load_nav_config(&self) -> Result<NavConfig> {
        let mut config = match &self.config {
            Some(path) => NavConfig::from_file(path)?,
            None => NavConfig::default(),
        };

        if let Some(provider) = &self.provider {
            config.provider.kind = parse_provider(provider)?;
        }
        if let Some(locale) = &self.locale {
            config.audit.locale = locale.clone();
        }
        if self.monitor {
            config.monitoring.enabled = true;
        }

        if let Command::Audit(args) = &self.command {
            if let Some(output) = &args.output {
                config.export.output_path = output.clone();
            }
            if !args.format.is_empty() {
                config.export.formats = args.format.clone();
            }
            if let Some(source) = &args.source {
                config.provider.csv.input_dir = source.clone();
            }
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            config.api.bind = bind.clone();
        }

        Ok(config)
    }
}

#[cfg(feature = "cli")]
fn parse_provider(value: &str) -> Result<ProviderKind> {
    ProviderKind::parse(value).ok_or_else(|| NavError::InvalidConfigValueError {
        field: "provider".to_string(),
        value: value.to_string(),
        reason: "expected csv, google_ads, bigquery or mock".to_string(),
    })
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(provider) = &self.provider {
            parse_provider(provider)?;
        }

        if let Command::Audit(args) = &self.command {
            normalize_customer_id("customer_id", &args.customer_id)?;
            if let Some(days) = args.days {
                validate_range("days", days, 1, 730)?;
            }
            for format in &args.format {
                if !SUPPORTED_EXPORT_FORMATS.contains(&format.as_str()) {
                    return Err(NavError::InvalidConfigValueError {
                        field: "format".to_string(),
                        value: format.clone(),
                        reason: format!(
                            "Unsupported format. Valid formats: {}",
                            SUPPORTED_EXPORT_FORMATS.join(", ")
                        ),
                    });
                }
            }
        }

        tracing::debug!("✅ CLI arguments validated");
        Ok(())
    }
}
