use std::sync::{Arc, Mutex};

use afisha::Database;
use afisha_bot::{ApiClient, Bot, BotConfig, ChangeDetector, TelegramClient, run_notifier, run_polling};
use tokio_util::sync::CancellationToken;

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

    let config = BotConfig::from_env()?;
    let options = config.render_options();

    let db = Arc::new(Mutex::new(Database::open(&config.database)?));
    log::info!("Using database {}", config.database);

    let api = ApiClient::new(&config.api_url)?;
    let telegram = Arc::new(TelegramClient::new(&config.telegram_token, config.locale)?);
    let bot = Arc::new(Bot::new(api.clone(), Arc::clone(&telegram), Arc::clone(&db), options));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            cancel.cancel();
        }
    });

    let notifier = tokio::spawn(run_notifier(
        ChangeDetector::new(api, options, config.retry_period),
        Arc::clone(&telegram),
        db,
        cancel.clone(),
    ));

    log::info!(
        "Starting bot, checking {} every {}s",
        config.api_url,
        config.retry_period.as_secs()
    );
    run_polling(bot, &telegram, cancel).await;
    notifier.await?;

    Ok(())
}
