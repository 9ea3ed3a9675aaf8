use finance_chat_assistant::{api::start_server, config::AssistantConfig, Assistant};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AssistantConfig::from_env()?;

    info!("Finance Chat Assistant - API Server");
    info!("Port: {}", config.port);

    let assistant = Arc::new(Assistant::from_config(&config)?);

    info!(remote_parser = assistant.has_remote_parser(), "Assistant initialized");

    start_server(assistant, config.port).await?;

    Ok(())
}
