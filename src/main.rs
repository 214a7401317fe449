mod models;
mod commands;
mod services;

use std::collections::HashSet;
use std::env;
use std::error;
use std::fs;
use std::sync::Arc;
use commands::get_framework;
use models::config::Config;
use serenity::all::{GatewayIntents, GuildId};
use services::bot_init;
use services::competition_source::WcaSource;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;

pub type Error = Box<dyn error::Error + Send + Sync>;
pub type BotContext<'a> = poise::Context<'a, Data, Error>;

/// Shared by every command handler.
pub struct Data {
    pub config: Arc<Config>,
    pub source: Arc<WcaSource>,
    /// Held for a whole sync cycle, shared with the hourly feed.
    pub sync_lock: Arc<Mutex<()>>,
    /// Guilds whose owner ran `/unlock-commands` since startup.
    pub unlocked_guilds: RwLock<HashSet<GuildId>>
}

fn init_logger() -> Result<WorkerGuard, Error> {
    let file_appender = tracing_appender::rolling::hourly("logs", "irontimer-bot.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing::subscriber::set_global_default(
        fmt::Subscriber::builder()
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_span_events(fmt::format::FmtSpan::CLOSE)
            .with_ansi(true)
            .with_max_level(tracing::Level::DEBUG)
            .finish()
            .with(fmt::Layer::default().with_ansi(false).with_writer(non_blocking))
    )?;

    const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");
    info!("Initializing IronTimer Bot v{}", VERSION.unwrap_or("<unknown>"));
    info!("Reading from {}", env::current_dir()?.display());

    Ok(guard)
}

fn load_config() -> Result<Config, Error> {
    let config_json = fs::read_to_string("config.json")
        .map_err(|ex| format!("config.json not found: {ex}"))?;
    let config = Config::from_json(&config_json)
        .map_err(|ex| format!("config.json is malformed: {ex}"))?
        .with_token_override(env::var("TOKEN").ok());

    if config.token.is_empty() {
        return Err("No token found".into());
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Dropping the guard stops the file writer, so it lives as long as main.
    let _guard = init_logger()?;

    let config = match load_config() {
        Ok(config) => Arc::new(config),
        Err(ex) => {
            error!("Failed to load configuration: {}", ex);
            return Err(ex);
        }
    };

    let source = Arc::new(WcaSource::new()?);
    let token = config.token.clone();
    let options = get_framework(&config);

    let framework = poise::Framework::builder()
        .options(options)
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                bot_init::ready(ctx, ready, framework, config, source).await
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await?;

    if let Err(ex) = client.start().await {
        error!("Discord bot client error: {:?}", ex);
    }

    Ok(())
}
