pub mod bot_init;
pub mod channel_history;
pub mod competition_feed;
pub mod competition_source;
pub mod competition_sync;
pub mod embeds;
