//! promptlab — playground server entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build provider, resolver, pricing cache, runner and test store
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Serve the HTTP API until shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use promptlab::config::{self, PricingSourceKind};
use promptlab::error::AppError;
use promptlab::http::{self, AppState};
use promptlab::logger;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        name = %config.name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let state = AppState::from_config(&config)?;

    // Shared shutdown token — Ctrl-C cancels it, the server watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config, &state);

    http::serve(state, &config.server.bind, shutdown).await
}

fn print_startup_summary(config: &config::Config, state: &AppState) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let defaults = state.runner.defaults();
    let pricing_line = match config.pricing.source {
        PricingSourceKind::Remote => format!(
            "remote ttl={}s fetch_timeout={}s",
            config.pricing.ttl.as_secs(),
            config.pricing.fetch_timeout.as_secs()
        ),
        PricingSourceKind::Static => "static table".to_string(),
    };
    let store_line = if state.store.is_persistent() {
        format!("persistent: {}", config.tests_dir().display())
    } else {
        "in-memory".to_string()
    };
    let model_count = state.runner.resolver().supported_models().count();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🧪 Promptlab Status                                          ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("name: {}", config.name)));
    println!("║   {}║", fit(format!("pid: {}", std::process::id())));
    println!("║   {}║", fit(format!("http: {}", config.server.bind)));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("llm: {} ({} models)", state.runner.provider_name(), model_count)));
    println!(
        "║   {}║",
        fit(format!(
            "batch: concurrency={} timeout={}ms",
            defaults.concurrency,
            defaults.timeout.as_millis()
        ))
    );
    println!("║   {}║", fit(format!("pricing: {pricing_line}")));
    println!("║   {}║", fit(format!("tests: {store_line}")));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: promptlab [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // -v warn, -vv info, -vvv debug, -vvvv+ trace.
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
