use std::sync::Arc;

use srm_bot::api::ApiClient;
use srm_bot::channel::TelegramChannel;
use srm_bot::config::BotConfig;
use srm_bot::flow::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;
    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").unwrap_or_else(|_| {
        eprintln!("Error: TELEGRAM_BOT_TOKEN not set");
        std::process::exit(1);
    });

    tracing::info!(
        api = %config.api_base_url,
        lang = %config.default_language.as_str(),
        "srm-bot v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let api = Arc::new(ApiClient::new(&config)?);
    let dispatcher = Arc::new(Dispatcher::new(api, &config));

    let channel = Arc::new(TelegramChannel::new(bot_token));
    channel.health_check().await?;

    channel.run(dispatcher).await;
    Ok(())
}
