//! Forgegate - permission-gating GitHub proxy binary.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use forgegate_policy::ProxyConfig;
use forgegate_server::run_with_shutdown;

/// Default listen port.
const DEFAULT_PORT: u16 = 8766;

/// Forgegate proxy
#[derive(Parser)]
#[command(name = "forgegate")]
#[command(about = "Permission-gating GitHub proxy for untrusted agents")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Config file path (default: ~/.config/forgegate/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

fn setup_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// `~/.config/forgegate/config.json`, following the XDG config dir.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forgegate").join("config.json"))
}

/// Log the credential layout with masked tokens so an operator can confirm
/// what the proxy will hand out.
fn log_credential_summary(config: &ProxyConfig) {
    if !config.pats.is_empty() {
        info!("PATs configured: {}", config.pats.len());
        for (index, entry) in config.pats.iter().enumerate() {
            info!(
                "  [{index}] {} -> {}",
                entry.token.masked(),
                entry.repos.join(", ")
            );
        }
        return;
    }

    if let Some(classic) = &config.classic_pat {
        info!("Classic PAT: {}", classic.masked());
    }
    if !config.fine_grained_pats.is_empty() {
        info!("Fine-grained PATs: {}", config.fine_grained_pats.len());
        for (index, entry) in config.fine_grained_pats.iter().enumerate() {
            info!(
                "  [{index}] {} -> {}",
                entry.pat.masked(),
                entry.repos.join(", ")
            );
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_logs);

    let config_path = match args.config.or_else(default_config_path) {
        Some(path) => path,
        None => {
            error!("Cannot determine config directory; pass --config");
            return ExitCode::FAILURE;
        }
    };

    let config = match ProxyConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config from {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    let addr = SocketAddr::new(args.bind, args.port);
    info!("Config: {}", config_path.display());
    info!("Rules: {}", config.rules.len());
    log_credential_summary(&config);
    info!("Press Ctrl+C to stop");

    let shutdown = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    };

    if let Err(e) = run_with_shutdown(addr, config, shutdown).await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}
