use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    // Use JSON logs in production (PRD_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("PRD_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "prd_server=info,prd_agents=info".into());
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = prd_server::config::ServerConfig::parse();
    tracing::info!("Starting PRD server on {}", config.listen_addr());
    tracing::info!("Output directory: {}", config.output_dir.display());
    if config.api_key().is_some() {
        tracing::info!("Provider: {} (model {})", config.base_url, config.model);
    }

    let server = prd_server::server::Server::new(config);
    server.run().await
}
