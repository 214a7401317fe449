use std::future::Future;
use std::sync::Arc;
use async_trait::async_trait;
use serenity::all::{ChannelId, CreateMessage, EditMessage, GetMessages, Http, Message, MessageId};
use tracing::debug;
use crate::services::embeds::StatusEmbed;

/// Discord hands out at most this many messages per history request.
const PAGE_SIZE: u8 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub id: MessageId,
    pub embed: Option<StatusEmbed>
}

impl From<&Message> for PostedMessage {
    fn from(message: &Message) -> Self {
        PostedMessage {
            id: message.id,
            embed: message.embeds.first().map(StatusEmbed::from)
        }
    }
}

/// The channel the competition feed posts into, used as its only record of
/// what has already been announced.
#[async_trait]
pub trait ChannelHistory {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Every message in the channel, newest first.
    async fn fetch_all_messages(&self) -> Result<Vec<PostedMessage>, Self::Error>;

    async fn send(&self, content: &str, embed: &StatusEmbed) -> Result<MessageId, Self::Error>;

    async fn edit_message(&self, message: MessageId, embed: &StatusEmbed) -> Result<(), Self::Error>;
}

/// Walks history backwards one page at a time. `fetch_page` gets the oldest id
/// seen so far and returns up to a page of messages older than it, newest first.
pub async fn fetch_pages<F, Fut, E>(mut fetch_page: F) -> Result<Vec<PostedMessage>, E>
where
    F: FnMut(Option<MessageId>) -> Fut,
    Fut: Future<Output = Result<Vec<PostedMessage>, E>>
{
    let mut output = Vec::new();
    let mut before: Option<MessageId> = None;

    loop {
        let page = fetch_page(before).await?;
        let page_len = page.len();

        before = page.last().map(|o| o.id);
        output.extend(page);

        if page_len < PAGE_SIZE as usize || before.is_none() {
            break;
        }
    }

    Ok(output)
}

pub struct DiscordChannel {
    http: Arc<Http>,
    channel_id: ChannelId
}

impl DiscordChannel {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> DiscordChannel {
        DiscordChannel { http, channel_id }
    }
}

#[async_trait]
impl ChannelHistory for DiscordChannel {
    type Error = serenity::Error;

    async fn fetch_all_messages(&self) -> Result<Vec<PostedMessage>, Self::Error> {
        let output = fetch_pages(|before| async move {
            let mut request = GetMessages::new().limit(PAGE_SIZE);
            if let Some(oldest) = before {
                request = request.before(oldest);
            }

            let page = self.channel_id.messages(&self.http, request).await?;
            Ok::<_, serenity::Error>(page.iter().map(PostedMessage::from).collect())
        }).await?;

        debug!(channel = %self.channel_id, count = output.len(), "Fetched channel history");

        Ok(output)
    }

    async fn send(&self, content: &str, embed: &StatusEmbed) -> Result<MessageId, Self::Error> {
        let message = self.channel_id.send_message(&self.http, CreateMessage::new()
            .content(content)
            .embed(embed.to_builder())
        ).await?;

        Ok(message.id)
    }

    async fn edit_message(&self, message: MessageId, embed: &StatusEmbed) -> Result<(), Self::Error> {
        self.channel_id.edit_message(&self.http, message, EditMessage::new().embed(embed.to_builder())).await?;

        Ok(())
    }
}
