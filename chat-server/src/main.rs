use std::path::PathBuf;

use chat_server::ChatServer;
use tracing_subscriber::EnvFilter;

/// Optional path to a TOML or YAML configuration file.
const CONFIG_FILE_ENV: &str = "RA_CONFIG_FILE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level))
        )
        .init();

    tracing::info!(
        chat_model = %config.models.chat_model,
        classifier_model = %config.models.classifier_model,
        retrieval = config.retrieval.is_active(),
        "Configuration loaded"
    );

    ChatServer::new(&config)?.run().await?;
    Ok(())
}
