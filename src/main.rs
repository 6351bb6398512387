use chrono::Utc;
use clap::Parser;
use paid_search_nav::adapters::{bigquery, google_ads, provider_from_config};
use paid_search_nav::config::{AuditArgs, Command, ProviderKind};
use paid_search_nav::core::audit::AuditPlan;
use paid_search_nav::domain::model::{AuditReport, AuditStatus, CustomerId};
use paid_search_nav::utils::{logger, validation::Validate};
use paid_search_nav::{
    AnalyzerRegistry, AuditRequest, AuditService, CliConfig, LocalStorage, NavConfig, NavError,
    Result,
};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting paid-search-nav CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 依嚴重程度決定結束碼
        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: &CliConfig) -> Result<()> {
    let config = cli.load_nav_config()?;
    config.validate()?;

    match &cli.command {
        Command::Analyzers => {
            print_analyzers(&AnalyzerRegistry::with_defaults());
            Ok(())
        }
        Command::Audit(args) => run_audit(&config, args).await,
        Command::Serve { .. } => serve(&config).await,
        Command::Mcp => serve_mcp(&config).await,
    }
}

fn print_analyzers(registry: &AnalyzerRegistry) {
    for info in registry.describe() {
        let reports: Vec<String> = info.required_reports.iter().map(|r| r.to_string()).collect();
        println!("{:<20} {}", info.name, info.description);
        println!("{:<20} reports: {}", "", reports.join(", "));
    }
}

async fn run_audit(config: &NavConfig, args: &AuditArgs) -> Result<()> {
    let customer_id = CustomerId::new(&args.customer_id)?;
    let range = args.date_range(config.audit.default_days, Utc::now().date_naive())?;
    let request = AuditRequest::new(customer_id, range).with_analyzers(args.analyzers.clone());

    let provider = provider_from_config(config)?;
    let storage = LocalStorage::new(config.export.output_path.clone());
    let service = AuditService::from_config(provider, storage, config);

    if args.dry_run {
        let plan = service.plan(&request)?;
        print_plan(config, &request, &plan)?;
        return Ok(());
    }

    let report = service.run_audit(request).await?;
    print_report(config, &report);

    match report.status {
        AuditStatus::Failed => Err(NavError::ProcessingError {
            message: report
                .error
                .unwrap_or_else(|| "Audit failed".to_string()),
        }),
        _ => Ok(()),
    }
}

fn print_plan(config: &NavConfig, request: &AuditRequest, plan: &AuditPlan) -> Result<()> {
    println!("🧭 Audit plan for {} ({})", request.customer_id, request.date_range);
    println!("   Analyzers: {}", plan.analyzers.join(", "));

    for kind in &plan.reports {
        println!("   📄 {}", kind);
        match config.provider.kind {
            ProviderKind::GoogleAds => {
                for query in google_ads::queries_for(*kind, &request.date_range) {
                    println!("      {}", query);
                }
            }
            ProviderKind::Bigquery => {
                let bq = config.bigquery()?;
                let sql = bigquery::sql_for(*kind, &bq.project_id, &bq.dataset, &request.customer_id);
                println!("      {}", sql);
            }
            ProviderKind::Csv => println!(
                "      {}/{}/{}.csv",
                config.provider.csv.input_dir,
                request.customer_id.as_str(),
                kind.file_stem()
            ),
            ProviderKind::Mock => {}
        }
    }
    Ok(())
}

fn print_report(config: &NavConfig, report: &AuditReport) {
    println!(
        "✅ Audit {} finished with status {:?}",
        report.id, report.status
    );
    for result in &report.results {
        println!(
            "   🔎 {:<20} {:>3} recommendations  {}",
            result.analyzer,
            result.recommendations.len(),
            result.summary
        );
    }
    for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
        println!(
            "   ⚠️ {:<20} {}",
            outcome.analyzer,
            outcome.error.as_deref().unwrap_or_default()
        );
    }
    println!(
        "   💰 Estimated savings: {:.2} {}",
        report.total_estimated_savings(),
        config.audit.currency
    );
    println!(
        "📁 Output saved to: {}/{}",
        config.export.output_path.trim_end_matches('/'),
        paid_search_nav::adapters::storage::ObjectPath::for_audit("", report).dir()
    );
}

#[cfg(feature = "server")]
async fn serve(config: &NavConfig) -> Result<()> {
    use paid_search_nav::api::{self, AppState};

    let provider = provider_from_config(config)?;
    let storage = LocalStorage::new(config.export.output_path.clone());
    let service = AuditService::from_config(provider, storage, config);
    let state = AppState::from_config(service, config)?;

    api::serve(
        state,
        &config.api.bind,
        std::time::Duration::from_secs(config.api.blacklist_sweep_seconds.max(1)),
    )
    .await
}

#[cfg(not(feature = "server"))]
async fn serve(_config: &NavConfig) -> Result<()> {
    Err(NavError::ConfigError {
        message: "this binary was built without the `server` feature".to_string(),
    })
}

#[cfg(feature = "mcp")]
async fn serve_mcp(config: &NavConfig) -> Result<()> {
    use paid_search_nav::mcp::{serve_stdio, AuditMcpServer};
    use std::sync::Arc;

    let provider = provider_from_config(config)?;
    let storage = LocalStorage::new(config.export.output_path.clone());
    let service = AuditService::from_config(provider, storage, config);

    serve_stdio(AuditMcpServer::new(Arc::new(service), config.audit.default_days)).await
}

#[cfg(not(feature = "mcp"))]
async fn serve_mcp(_config: &NavConfig) -> Result<()> {
    Err(NavError::ConfigError {
        message: "this binary was built without the `mcp` feature".to_string(),
    })
}
