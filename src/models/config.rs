use serde::Deserialize;
use serenity::all::{ChannelId, GuildId, RoleId, UserId};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_prefix")]
    pub cmd_prefix: String,
    pub guild_id: GuildId,
    #[serde(default)]
    pub dev: bool,
    pub dev_id: Option<UserId>,
    #[serde(default)]
    pub delete_unused_slash_commands: bool,
    pub roles: Roles,
    pub channels: Channels,
    #[serde(default)]
    pub competition_feed: FeedConfig
}

#[derive(Debug, Deserialize)]
pub struct Roles {
    pub competition_ping: RoleId
}

#[derive(Debug, Deserialize)]
pub struct Channels {
    pub competition_updates: ChannelId
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub interval_minutes: u64,
    pub edit_ended_in_place: bool
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            interval_minutes: 60,
            edit_ended_in_place: false
        }
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

impl Config {
    pub fn from_json(json: &str) -> serde_json::Result<Config> {
        serde_json::from_str(json)
    }

    /// `TOKEN` from the environment wins over the one in config.json.
    pub fn with_token_override(mut self, token: Option<String>) -> Config {
        if let Some(token) = token.filter(|o| !o.is_empty()) {
            self.token = token;
        }

        self
    }
}
