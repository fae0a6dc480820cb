use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use vouch_issuer::{create_app, AppState, IssuerConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the issuer configuration file.
    #[clap(short, long, value_parser, default_value = "config/issuer.toml")]
    config: PathBuf,

    /// Overrides `listen_addr` from the configuration file.
    #[clap(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = IssuerConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration: {:?}", args.config))?;

    let log_level_str = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    info!("Loaded configuration from: {:?}", args.config);

    let state = AppState::from_config(&config).context("Invalid issuer configuration")?;
    info!("Starting {} with DID {}", config.name, state.issuer.did);
    for offering in &config.offerings {
        info!(
            "Offering {} at POST {}",
            offering.credential_type, offering.path
        );
    }

    let app = create_app(state, &config.offerings);

    let addr = args.listen.unwrap_or(config.listen_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("listening on {}", addr);
    info!("Swagger UI available at http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Received shutdown signal (Ctrl+C).");
        })
        .await
        .context("Server error")?;

    info!("Shutting down issuer...");
    Ok(())
}
