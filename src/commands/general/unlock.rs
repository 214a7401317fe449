use tracing::info;
use crate::{BotContext, Error};

#[poise::command(
    prefix_command,
    slash_command,
    description_localized("en-US", "Unlock this bot's commands for the server. Only the server owner can do this."),
    guild_only,
    rename = "unlock-commands"
)]
pub async fn unlock_commands(ctx: BotContext<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };

    let guild = guild_id.to_partial_guild(ctx.serenity_context()).await?;

    if guild.owner_id != ctx.author().id {
        ctx.say("❌ Only the server owner can unlock commands.").await?;
        return Ok(());
    }

    let newly_unlocked = ctx.data().unlocked_guilds.write().await.insert(guild_id);

    if newly_unlocked {
        info!("Commands unlocked for guild {} ({})", guild.name, guild_id);
        ctx.say("✅ Commands have been unlocked for this server.").await?;
    } else {
        ctx.say("Commands are already unlocked for this server.").await?;
    }

    Ok(())
}
