mod list;
mod refresh;

use list::*;
use refresh::*;
use crate::{BotContext, Error};

#[poise::command(prefix_command, slash_command,
    description_localized("en-US", "Upcoming and in-progress World Cube Association competitions."),
    subcommands("list", "refresh"),
    discard_spare_arguments,
    guild_only,
    aliases("comps"),
    identifying_name = "Competitions"
)]
pub async fn competitions(ctx: BotContext<'_>) -> Result<(), Error> {
    list_code(ctx).await
}
