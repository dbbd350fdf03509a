use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::FalseyValueParser;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use podrelay::{AppState, Backend, Settings, build_router};

/// Podcast backend: catalog edits, audio uploads and push notifications
#[derive(Parser, Debug)]
#[command(name = "podrelay")]
#[command(about = "Podcast backend: catalog edits, audio uploads and push notifications")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PODRELAY_BIND", default_value = "0.0.0.0:8787")]
    bind: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "PODRELAY_LOG_JSON", value_parser = FalseyValueParser::new())]
    log_json: bool,

    #[command(flatten)]
    settings: Settings,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let state = match args.settings.validate() {
        Ok(config) => {
            info!(
                repo = %format!("{}/{}", config.catalog.owner, config.catalog.repo),
                catalog = %config.catalog.path,
                blobs = %config.blob_dir.display(),
                subscriptions = %config.subscriptions_dir.display(),
                "configuration loaded"
            );
            let backend = Backend::from_config(&config).context("Failed to open storage")?;
            AppState::ready(backend)
        }
        Err(e) => {
            // Still serve: preflights succeed, everything else reports this error
            error!(error = %e, "configuration invalid, every request will fail");
            AppState::misconfigured(e)
        }
    };

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(bind = %args.bind, "podrelay listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
