use anyhow::Result;
use db::DBService;
use server::{AppState, router};
use services::services::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    if config.mail.is_none() {
        warn!("MAILGUN_API_KEY/MAILGUN_DOMAIN not set - share and completion emails will fail");
    }

    let db = DBService::new(&config.database_url).await?;
    let state = AppState::new(db, &config)?;
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "daytally server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
