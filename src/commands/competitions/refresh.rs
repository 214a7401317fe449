use tracing::error;
use crate::{BotContext, Error};
use crate::services::competition_feed;

#[poise::command(
    prefix_command,
    slash_command,
    description_localized("en-US", "Check for competition updates now instead of waiting for the next hourly run."),
    guild_only,
    owners_only
)]
pub async fn refresh(ctx: BotContext<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    let data = ctx.data();

    match competition_feed::run_once(&ctx.serenity_context().http, &data.config, data.source.as_ref(), &data.sync_lock).await {
        Ok(report) => {
            ctx.say(format!("Posted {} update(s): {} upcoming, {} started, {} ended. {} failed to send.",
                report.posted(), report.upcoming, report.in_progress, report.ended, report.failed)).await?;
        }
        Err(ex) => {
            error!("Manual competition update failed: {}", ex);
            ctx.say(format!("Couldn't update competitions: {ex}")).await?;
        }
    }

    Ok(())
}
