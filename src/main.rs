//! Ayah Bot — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Build the content client and session controller
//!   6. Spawn Ctrl-C → shutdown signal watcher and the idle-session sweep
//!   7. Start comms channels and wait for them to finish

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ayah_bot::content::ContentClient;
use ayah_bot::error::AppError;
use ayah_bot::session::SessionController;
use ayah_bot::subsystems::comms;
use ayah_bot::{config, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;
    if args.interactive {
        config.comms.pty.enabled = true;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        content_base_url = %config.content.base_url,
        timeout_s = config.content.timeout.as_secs(),
        max_retries = config.content.max_retries,
        effective_log_level = %effective_log_level,
        interactive = args.interactive,
        "config loaded"
    );

    if config.comms.telegram.enabled && config.bot_token.is_none() {
        warn!("TELEGRAM_BOT_TOKEN not set — telegram channel disabled");
    }

    let content = ContentClient::new(&config.content)?;
    let controller = Arc::new(SessionController::new(content));

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let sweep = controller.spawn_idle_sweep(config.session.idle_timeout, shutdown.clone());

    let handle = comms::start(&config, controller, shutdown.clone());
    info!(channels = handle.channel_count(), "comms started");

    let result = handle.join().await;
    shutdown.cancel();
    let _ = sweep.await;
    info!("shutdown complete");
    result
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<PathBuf>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = std::env::var_os("AYAH_CONFIG").map(PathBuf::from);

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: ayah-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Enable the console channel");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(PathBuf::from(path));
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

    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
