use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 設為 `json` 時 CLI / serve 也輸出 JSON lines
pub const LOG_FORMAT_ENV: &str = "PAID_SEARCH_NAV_LOG_FORMAT";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "paid_search_nav=debug,tower_http=debug,info"
    } else {
        "paid_search_nav=info,warn"
    }
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn wants_json() -> bool {
    std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

pub fn init_cli_logger(verbose: bool) {
    if wants_json() {
        init_json_with(env_filter(verbose));
        return;
    }

    // MCP stdio 模式下 stdout 是協定通道，日誌一律寫到 stderr
    let _ = tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

pub fn init_json_logger() {
    init_json_with(env_filter(false));
}

fn init_json_with(filter: EnvFilter) {
    // customer_id / audit_id 等欄位攤平到最上層，CloudWatch Insights 可直接查詢
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .json()
                .with_current_span(false)
                .flatten_event(true),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        for verbose in [false, true] {
            let directive = default_directive(verbose);
            assert!(directive.starts_with("paid_search_nav="));
            assert!(EnvFilter::try_new(directive).is_ok());
        }
    }

    #[test]
    fn test_json_logger_initializes() {
        init_json_logger();
        // 已有全域 subscriber 時不應 panic
        init_json_logger();
        tracing::info!(customer_id = "1234567890", "🧪 JSON logger ready");
    }
}
