use std::sync::Arc;
use std::time::Duration;
use serenity::all::{ChannelId, ChannelType, GuildId, Http, Mentionable, RoleId};
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info};
use crate::models::config::Config;
use crate::services::channel_history::DiscordChannel;
use crate::services::competition_source::CompetitionSource;
use crate::services::competition_sync::{run_exclusive, SyncError, SyncOptions, SyncReport};

pub struct FeedTarget {
    pub channel: DiscordChannel,
    pub mention: String
}

/// Picks the configured ping role and updates channel out of what the guild
/// has. Only plain text channels are accepted.
pub fn select_target(
    guild_id: GuildId,
    role_ids: impl IntoIterator<Item = RoleId>,
    channels: impl IntoIterator<Item = (ChannelId, ChannelType)>,
    config: &Config
) -> Result<(ChannelId, RoleId), SyncError> {
    let role_id = config.roles.competition_ping;
    if !role_ids.into_iter().any(|o| o == role_id) {
        return Err(SyncError::ChannelResolution(format!("role {role_id} in guild {guild_id}")));
    }

    let channel_id = config.channels.competition_updates;
    match channels.into_iter().find(|(id, _)| *id == channel_id) {
        Some((_, ChannelType::Text)) => Ok((channel_id, role_id)),
        Some((_, kind)) => Err(SyncError::ChannelResolution(format!("channel {channel_id} in guild {guild_id} is not a text channel ({})", kind.name()))),
        None => Err(SyncError::ChannelResolution(format!("channel {channel_id} in guild {guild_id}")))
    }
}

/// Looks up the configured guild, updates channel and ping role. Any of them
/// missing means there is nowhere to post this cycle.
pub async fn resolve_target(http: &Arc<Http>, config: &Config) -> Result<FeedTarget, SyncError> {
    let guild = config.guild_id.to_partial_guild(http).await
        .map_err(|ex| SyncError::ChannelResolution(format!("guild {}: {}", config.guild_id, ex)))?;

    let channels = guild.id.channels(http).await
        .map_err(|ex| SyncError::ChannelResolution(format!("channels of guild {}: {}", guild.id, ex)))?;

    let (channel_id, role_id) = select_target(
        guild.id,
        guild.roles.keys().copied(),
        channels.values().map(|o| (o.id, o.kind)),
        config
    )?;

    Ok(FeedTarget {
        channel: DiscordChannel::new(http.clone(), channel_id),
        mention: role_id.mention().to_string()
    })
}

/// One cycle against the configured channel. `lock` is shared by every caller
/// so the hourly run and a manual refresh never overlap.
pub async fn run_once<S>(http: &Arc<Http>, config: &Config, source: &S, lock: &Mutex<()>) -> Result<SyncReport, SyncError>
where
    S: CompetitionSource + Sync
{
    let target = resolve_target(http, config).await?;
    let options = SyncOptions {
        edit_ended_in_place: config.competition_feed.edit_ended_in_place
    };

    run_exclusive(lock, source, &target.channel, &target.mention, options).await
}

pub async fn competition_feed<S>(http: Arc<Http>, config: Arc<Config>, source: Arc<S>, lock: Arc<Mutex<()>>)
where
    S: CompetitionSource + Send + Sync
{
    let period = Duration::from_secs(config.competition_feed.interval_minutes.max(1) * 60);
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Posting competition updates every {} minutes", period.as_secs() / 60);

    loop {
        interval.tick().await;

        match run_once(&http, &config, source.as_ref(), &lock).await {
            Ok(report) => {
                info!("Competition update finished: {} upcoming, {} started, {} ended, {} failed",
                    report.upcoming, report.in_progress, report.ended, report.failed);
            }
            Err(ex) => {
                error!("Skipping competition update: {}", ex);
            }
        }
    }
}
