use afisha::{Database, WebScraper};
use afisha_server::{AppState, Config, router};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e.into());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env();
    if config.admin_token.is_none() {
        log::warn!("AFISHA_ADMIN_TOKEN is not set, write endpoints are disabled");
    }

    let scraper = WebScraper::with_base_url(&config.source_url)?;
    let db = Database::open(&config.database)?;
    log::info!("Using database {}", config.database);

    let state = AppState::new(scraper, db, config.admin_token.clone());
    let app = router(state).layer(CorsLayer::permissive());
    let tcp_listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    log::info!("Starting events API on address: {}", config.bind_address);

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await?;

    Ok(())
}
