use serenity::all::{CreateEmbed, CreateEmbedFooter, Embed, Timestamp};

pub const SITE_URL: &str = "www.irontimer.com";
pub const ICON_URL: &str = "https://i.imgur.com/tNOSzmQ.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusField {
    pub name: String,
    pub value: String,
    pub inline: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFooter {
    pub text: String,
    pub icon_url: Option<String>
}

/// The parts of a Discord embed the competition feed reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEmbed {
    pub title: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub colour: Option<u32>,
    pub fields: Vec<StatusField>,
    pub footer: Option<StatusFooter>,
    /// Unix seconds.
    pub timestamp: Option<i64>
}

impl StatusEmbed {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(StatusField { name: name.into(), value: value.into(), inline });
        self
    }

    /// Adds the site footer and a timestamp, unless the embed already has them.
    pub fn branded(mut self, now: i64) -> Self {
        let footer_text = match self.footer.take() {
            Some(footer) if footer.text.contains(SITE_URL) => footer.text,
            Some(footer) => format!("{SITE_URL} | {}", footer.text),
            None => SITE_URL.to_string()
        };

        self.footer = Some(StatusFooter {
            text: footer_text,
            icon_url: Some(ICON_URL.to_string())
        });

        if self.timestamp.is_none() {
            self.timestamp = Some(now);
        }

        self
    }

    pub fn to_builder(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new();

        if let Some(title) = &self.title {
            embed = embed.title(title);
        }
        if let Some(url) = &self.url {
            embed = embed.url(url);
        }
        if let Some(description) = &self.description {
            embed = embed.description(description);
        }
        if let Some(colour) = self.colour {
            embed = embed.colour(colour);
        }

        embed = embed.fields(self.fields.iter().map(|o| (o.name.clone(), o.value.clone(), o.inline)));

        if let Some(footer) = &self.footer {
            let mut builder = CreateEmbedFooter::new(&footer.text);
            if let Some(icon_url) = &footer.icon_url {
                builder = builder.icon_url(icon_url);
            }
            embed = embed.footer(builder);
        }

        if let Some(timestamp) = self.timestamp.and_then(|o| Timestamp::from_unix_timestamp(o).ok()) {
            embed = embed.timestamp(timestamp);
        }

        embed
    }
}

impl From<&Embed> for StatusEmbed {
    fn from(embed: &Embed) -> Self {
        StatusEmbed {
            title: embed.title.clone(),
            url: embed.url.clone(),
            description: embed.description.clone(),
            colour: embed.colour.map(|o| o.0),
            fields: embed.fields.iter()
                .map(|o| StatusField { name: o.name.clone(), value: o.value.clone(), inline: o.inline })
                .collect(),
            footer: embed.footer.as_ref().map(|o| StatusFooter {
                text: o.text.clone(),
                icon_url: o.icon_url.clone()
            }),
            timestamp: embed.timestamp.map(|o| o.unix_timestamp())
        }
    }
}
