use spectrum_compass_server::{config::ServerConfig, error::StartupError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> spectrum_compass_core::Result<(), StartupError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        knowledge_base = %config.retrieval.knowledge_base_path.display(),
        "Loaded configuration"
    );

    spectrum_compass_server::run(config).await
}
