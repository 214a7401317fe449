mod general;
pub mod competitions;

use std::collections::HashSet;
use tracing::{error, info};
use crate::{BotContext, Data, Error};
use crate::models::config::Config;

const UNEXPECTED_ERROR: &str = "❌ Unexpected error occured. Please report this.";
const UNLOCK_COMMAND: &str = "unlock-commands";

/// Display the list of commands available, as well as their descriptions.
#[poise::command(prefix_command, track_edits, slash_command)]
async fn help(
    ctx: BotContext<'_>,
    #[description = "The command requested for help"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
        .await?;
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("An error occured running command \"{}\": {}", ctx.command().name, error);

            if let Err(ex) = ctx.say(UNEXPECTED_ERROR).await {
                error!("Couldn't reply with the error message: {}", ex);
            }
        }
        other => {
            if let Err(ex) = poise::builtins::on_error(other).await {
                error!("Failed to handle framework error: {}", ex);
            }
        }
    }
}

pub fn is_unlocked(dev: bool, command_name: &str, guild_unlocked: bool) -> bool {
    dev || guild_unlocked || command_name == UNLOCK_COMMAND
}

/// Every command stays locked in a guild until its owner runs `/unlock-commands`.
async fn unlock_check(ctx: BotContext<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };

    let data = ctx.data();
    let guild_unlocked = data.unlocked_guilds.read().await.contains(&guild_id);

    if is_unlocked(data.config.dev, &ctx.command().name, guild_unlocked) {
        info!("Running command \"{}\"", ctx.command().qualified_name);
        return Ok(true);
    }

    ctx.say(format!("❌ Commands have not been unlocked for this server.\nServer owner must run /{UNLOCK_COMMAND} to unlock commands")).await?;

    Ok(false)
}

pub fn get_framework(config: &Config) -> poise::FrameworkOptions<Data, Error> {
    let owners = config.dev_id.into_iter().collect::<HashSet<_>>();

    poise::FrameworkOptions {
        commands: vec![
            help(),
            general::info(),
            general::register(),
            general::unlock_commands(),
            competitions::competitions()
        ],
        prefix_options: poise::PrefixFrameworkOptions {
            prefix: Some(config.cmd_prefix.clone()),
            mention_as_prefix: true,
            ..Default::default()
        },
        command_check: Some(|ctx| Box::pin(unlock_check(ctx))),
        on_error: |error| Box::pin(on_error(error)),
        owners,
        ..Default::default()
    }
}
