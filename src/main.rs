use rephrase::{api, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rephrase=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match dotenv {
        Ok(path) => tracing::info!("Loaded environment from {}", path.display()),
        Err(_) => tracing::info!("No .env file found, reading from environment"),
    }

    let config = Config::from_env()?;
    tracing::info!(?config, "Starting Rephrase");

    api::serve(config).await
}
