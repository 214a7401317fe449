use tracing::error;
use crate::{BotContext, Error};
use crate::models::competition::{Competition, format_date};
use crate::services::competition_source::{CompetitionSource, Listings};

const PER_PAGE: usize = 10;

fn describe(competition: &Competition, marker: &str) -> String {
    let dates = match competition.dates.end {
        Some(end) if end != competition.dates.start => format!("{} - {}", format_date(competition.dates.start), format_date(end)),
        _ => format_date(competition.dates.start)
    };

    format!("{marker} **[{}]({})**\n{} | {}", competition.name, competition.url, competition.location, dates)
}

/// One page of text per `per_page` competitions, in-progress ones first.
pub fn listing_pages(listings: &Listings, per_page: usize) -> Vec<String> {
    let entries = listings.in_progress.iter()
        .map(|o| describe(o, "🟡"))
        .chain(listings.upcoming.iter().map(|o| describe(o, "🟢")))
        .collect::<Vec<_>>();

    if entries.is_empty() {
        return vec!["None".to_string()];
    }

    entries.chunks(per_page.max(1))
        .map(|o| o.join("\n\n"))
        .collect()
}

#[poise::command(
    prefix_command,
    slash_command,
    description_localized("en-US", "List the upcoming and in-progress competitions."),
    guild_only
)]
pub async fn list(ctx: BotContext<'_>) -> Result<(), Error> {
    list_code(ctx).await
}

pub async fn list_code(ctx: BotContext<'_>) -> Result<(), Error> {
    ctx.defer().await?;

    match ctx.data().source.fetch_competitions().await {
        Ok(listings) => {
            let pages = listing_pages(&listings, PER_PAGE);
            let pages = pages.iter().map(String::as_str).collect::<Vec<_>>();

            poise::builtins::paginate(ctx, &pages).await?;
        }
        Err(ex) => {
            ctx.say("Failed to reach the World Cube Association website, try again later?").await?;
            error!("Failed to get competitions: {}", ex);
        }
    }

    Ok(())
}
