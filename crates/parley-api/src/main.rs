use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley_api::{app::build_router, config::Config, session::MemorySessionStore, state::AppState};
use parley_llm::{ProviderFactory, ProviderKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Parley server");

    let factory = ProviderFactory::from_config(&config.provider_config())?;
    for kind in ProviderKind::ALL {
        if factory.is_configured(kind) {
            tracing::info!(provider = %kind, "Provider enabled");
        }
    }

    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.session.idle_timeout_secs,
    )));

    let state = AppState::new(config.clone(), factory, sessions);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
