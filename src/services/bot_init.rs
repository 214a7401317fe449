use std::collections::HashSet;
use std::sync::Arc;
use serenity::{
    client::Context,
    model::gateway::Ready
};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};
use crate::{Data, Error};
use crate::models::config::Config;
use crate::services::competition_feed;
use crate::services::competition_source::WcaSource;

pub async fn register_commands(ctx: &Context, commands: &[poise::Command<Data, Error>], config: &Config) {
    let builders = poise::builtins::create_application_commands(commands);
    let guild_id = config.guild_id;

    if config.delete_unused_slash_commands {
        // Overwrites the whole set, so anything we no longer ship disappears.
        match guild_id.set_commands(ctx, builders).await {
            Ok(created) => info!("Registered {} commands in guild {}", created.len(), guild_id),
            Err(ex) => error!("Failed to create slash commands: {}", ex)
        }

        return;
    }

    for builder in builders {
        match guild_id.create_command(ctx, builder).await {
            Ok(command) => info!("Created or updated command \"{}\" ({})", command.name, command.id),
            Err(ex) => error!("Error creating command: {}", ex)
        }
    }
}

pub async fn ready(
    ctx: &Context,
    ready: &Ready,
    framework: &poise::Framework<Data, Error>,
    config: Arc<Config>,
    source: Arc<WcaSource>
) -> Result<Data, Error> {
    info!("Logged in as {}", ready.user.name);

    register_commands(ctx, &framework.options().commands, &config).await;

    // Runs for the life of the bot; the first update goes out right away.
    let sync_lock = Arc::new(Mutex::new(()));

    #[allow(clippy::let_underscore_future)]
    let _ = tokio::task::spawn(competition_feed::competition_feed(ctx.http.clone(), config.clone(), source.clone(), sync_lock.clone()));

    Ok(Data {
        config,
        source,
        sync_lock,
        unlocked_guilds: RwLock::new(HashSet::new())
    })
}
