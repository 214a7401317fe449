use std::collections::HashSet;
use std::error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use crate::models::competition::{Competition, format_date};
use crate::services::channel_history::{ChannelHistory, PostedMessage};
use crate::services::competition_source::{CompetitionSource, Listings, SourceError};
use crate::services::embeds::StatusEmbed;

pub const GREEN: u32 = 0x00ff00;
pub const YELLOW: u32 = 0xffff00;
pub const RED: u32 = 0xff0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upcoming,
    InProgress,
    Ended
}

impl Phase {
    pub fn description(self) -> &'static str {
        match self {
            Phase::Upcoming => "This is a new upcoming competition.",
            Phase::InProgress => "This competition has started.",
            Phase::Ended => "This competition has ended."
        }
    }

    pub fn colour(self) -> u32 {
        match self {
            Phase::Upcoming => GREEN,
            Phase::InProgress => YELLOW,
            Phase::Ended => RED
        }
    }

    pub fn from_description(description: &str) -> Option<Phase> {
        [Phase::Upcoming, Phase::InProgress, Phase::Ended]
            .into_iter()
            .find(|o| o.description() == description)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("competition source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("could not resolve {0}")]
    ChannelResolution(String),

    #[error("failed to read channel history: {0}")]
    History(Box<dyn error::Error + Send + Sync>)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Rewrite the started post instead of announcing the end in a new one.
    pub edit_ended_in_place: bool
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub upcoming: usize,
    pub in_progress: usize,
    pub ended: usize,
    pub failed: usize
}

impl SyncReport {
    pub fn posted(&self) -> usize {
        self.upcoming + self.in_progress + self.ended
    }
}

/// A status post found in the channel.
#[derive(Debug, Clone, Copy)]
pub struct PostedRecord<'a> {
    pub message: &'a PostedMessage,
    pub embed: &'a StatusEmbed,
    pub title: &'a str,
    pub url: &'a str,
    pub phase: Phase
}

impl<'a> PostedRecord<'a> {
    pub fn read(message: &'a PostedMessage) -> Option<PostedRecord<'a>> {
        let embed = message.embed.as_ref()?;

        Some(PostedRecord {
            message,
            embed,
            title: embed.title.as_deref()?,
            url: embed.url.as_deref()?,
            phase: Phase::from_description(embed.description.as_deref()?)?
        })
    }

    fn is(&self, title: &str, url: &str, phase: Phase) -> bool {
        self.phase == phase && self.title == title && self.url == url
    }
}

#[derive(Debug, Default)]
pub struct SyncPlan<'a> {
    pub new_upcoming: Vec<&'a Competition>,
    pub new_in_progress: Vec<&'a Competition>,
    pub newly_ended: Vec<PostedRecord<'a>>
}

impl SyncPlan<'_> {
    pub fn is_empty(&self) -> bool {
        self.new_upcoming.is_empty() && self.new_in_progress.is_empty() && self.newly_ended.is_empty()
    }
}

fn not_posted<'a>(competitions: &'a [Competition], records: &[PostedRecord<'_>], phase: Phase) -> Vec<&'a Competition> {
    competitions.iter()
        .filter(|competition| !records.iter().any(|o| o.is(&competition.name, &competition.url, phase)))
        .collect()
}

/// Works out which posts a cycle has to make, given what the channel already
/// holds and what the source lists right now.
pub fn plan<'a>(messages: &'a [PostedMessage], listings: &'a Listings) -> SyncPlan<'a> {
    let records = messages.iter().filter_map(PostedRecord::read).collect::<Vec<_>>();

    let new_upcoming = not_posted(&listings.upcoming, &records, Phase::Upcoming);
    let new_in_progress = not_posted(&listings.in_progress, &records, Phase::InProgress);

    // Competitions whose end was already announced are done.
    let mut handled = records.iter()
        .filter(|o| o.phase == Phase::Ended)
        .map(|o| (o.title, o.url))
        .collect::<HashSet<_>>();

    let newly_ended = records.iter()
        .filter(|o| o.phase == Phase::InProgress)
        .filter(|o| !listings.in_progress.iter().any(|c| c.is_same(o.title, o.url)))
        .filter(|o| handled.insert((o.title, o.url)))
        .copied()
        .collect();

    SyncPlan { new_upcoming, new_in_progress, newly_ended }
}

pub fn status_embed(competition: &Competition, phase: Phase, now: i64) -> StatusEmbed {
    let embed = StatusEmbed {
        title: Some(competition.name.clone()),
        url: Some(competition.url.clone()),
        description: Some(phase.description().to_string()),
        colour: Some(phase.colour()),
        ..Default::default()
    };

    embed
        .field("Location", &competition.location, false)
        .field("Start Date", format_date(competition.dates.start), true)
        .field("End Date", format_date(competition.dates.end_or_start()), true)
        .branded(now)
}

/// The started post, restyled as ended. Everything else is carried over.
pub fn ended_embed(started: &StatusEmbed) -> StatusEmbed {
    StatusEmbed {
        description: Some(Phase::Ended.description().to_string()),
        colour: Some(Phase::Ended.colour()),
        ..started.clone()
    }
}

async fn post<H: ChannelHistory>(history: &H, mention: &str, embed: &StatusEmbed, report: &mut SyncReport) -> bool {
    let title = embed.title.as_deref().unwrap_or_default();

    match history.send(mention, embed).await {
        Ok(id) => {
            info!("Posted \"{}\" for {} ({})", embed.description.as_deref().unwrap_or_default(), title, id);
            true
        }
        Err(ex) => {
            error!("Failed to post competition update for {}: {}", title, ex);
            report.failed += 1;
            false
        }
    }
}

/// Runs one reconciliation pass between the competition source and the channel.
///
/// Nothing is posted unless both the channel history and the source could be
/// read. Once posting starts, a failed message is logged and skipped.
pub async fn run_sync_cycle<S, H>(source: &S, history: &H, mention: &str, options: SyncOptions) -> Result<SyncReport, SyncError>
where
    S: CompetitionSource + Sync,
    H: ChannelHistory + Sync
{
    let messages = history.fetch_all_messages().await
        .map_err(|ex| SyncError::History(Box::new(ex)))?;
    let listings = source.fetch_competitions().await?;

    let plan = plan(&messages, &listings);
    if plan.is_empty() {
        debug!("No competition changes across {} channel messages", messages.len());
    }

    let now = chrono::Utc::now().timestamp();
    let mut report = SyncReport::default();

    for competition in &plan.new_upcoming {
        let embed = status_embed(competition, Phase::Upcoming, now);
        if post(history, mention, &embed, &mut report).await {
            report.upcoming += 1;
        }
    }

    for competition in &plan.new_in_progress {
        let embed = status_embed(competition, Phase::InProgress, now);
        if post(history, mention, &embed, &mut report).await {
            report.in_progress += 1;
        }
    }

    for record in &plan.newly_ended {
        let embed = ended_embed(record.embed);

        if options.edit_ended_in_place {
            match history.edit_message(record.message.id, &embed).await {
                Ok(()) => {
                    info!("Marked {} as ended ({})", record.title, record.message.id);
                    report.ended += 1;
                }
                Err(ex) => {
                    error!("Failed to mark {} as ended: {}", record.title, ex);
                    report.failed += 1;
                }
            }
        } else if post(history, mention, &embed, &mut report).await {
            report.ended += 1;
        }
    }

    Ok(report)
}

/// Same as [`run_sync_cycle`], but waits for any other cycle sharing `lock` to
/// finish first. Two cycles reading the same history would both post.
pub async fn run_exclusive<S, H>(lock: &Mutex<()>, source: &S, history: &H, mention: &str, options: SyncOptions) -> Result<SyncReport, SyncError>
where
    S: CompetitionSource + Sync,
    H: ChannelHistory + Sync
{
    let _running = lock.lock().await;

    run_sync_cycle(source, history, mention, options).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serenity::all::MessageId;
    use crate::models::competition::DateRange;
    use super::*;

    const MENTION: &str = "<@&789>";

    #[derive(thiserror::Error, Debug)]
    #[error("discord said no")]
    struct Rejected;

    struct FakeSource {
        listings: Option<Listings>
    }

    #[async_trait]
    impl CompetitionSource for FakeSource {
        async fn fetch_competitions(&self) -> Result<Listings, SourceError> {
            self.listings.clone().ok_or(SourceError::UnexpectedLayout)
        }
    }

    #[derive(Default)]
    struct FakeChannel {
        messages: Mutex<Vec<PostedMessage>>,
        sent: Mutex<Vec<(String, StatusEmbed)>>,
        edited: Mutex<Vec<(MessageId, StatusEmbed)>>,
        attempts: Mutex<usize>,
        fail_attempts: Vec<usize>,
        unreadable: bool
    }

    impl FakeChannel {
        fn with_embeds(embeds: Vec<StatusEmbed>) -> FakeChannel {
            let messages = embeds.into_iter()
                .enumerate()
                .map(|(i, embed)| PostedMessage { id: MessageId::new(i as u64 + 1), embed: Some(embed) })
                .collect();

            FakeChannel { messages: Mutex::new(messages), ..Default::default() }
        }

        fn sent(&self) -> Vec<(String, StatusEmbed)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelHistory for FakeChannel {
        type Error = Rejected;

        async fn fetch_all_messages(&self) -> Result<Vec<PostedMessage>, Self::Error> {
            // Lets an overlapping cycle read the same history before this one posts.
            tokio::task::yield_now().await;

            if self.unreadable {
                return Err(Rejected);
            }

            Ok(self.messages.lock().unwrap().clone())
        }

        async fn send(&self, content: &str, embed: &StatusEmbed) -> Result<MessageId, Self::Error> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts
            };

            if self.fail_attempts.contains(&attempt) {
                return Err(Rejected);
            }

            let id = MessageId::new(1000 + attempt as u64);
            self.sent.lock().unwrap().push((content.to_string(), embed.clone()));
            self.messages.lock().unwrap().insert(0, PostedMessage { id, embed: Some(embed.clone()) });

            Ok(id)
        }

        async fn edit_message(&self, message: MessageId, embed: &StatusEmbed) -> Result<(), Self::Error> {
            self.edited.lock().unwrap().push((message, embed.clone()));

            let mut messages = self.messages.lock().unwrap();
            if let Some(found) = messages.iter_mut().find(|o| o.id == message) {
                found.embed = Some(embed.clone());
            }

            Ok(())
        }
    }

    fn competition(name: &str, start: (i32, u32, u32), end: Option<(i32, u32, u32)>) -> Competition {
        let date = |(y, m, d): (i32, u32, u32)| NaiveDate::from_ymd_opt(y, m, d).unwrap();

        Competition {
            name: name.to_string(),
            dates: DateRange { start: date(start), end: end.map(date) },
            location: "Tokyo".to_string(),
            url: format!("https://www.worldcubeassociation.org/competitions/{}", name.replace(' ', "")),
        }
    }

    fn started(competition: &Competition) -> StatusEmbed {
        status_embed(competition, Phase::InProgress, 0)
    }

    fn source(upcoming: Vec<Competition>, in_progress: Vec<Competition>) -> FakeSource {
        FakeSource { listings: Some(Listings { upcoming, in_progress }) }
    }

    fn field<'a>(embed: &'a StatusEmbed, name: &str) -> &'a str {
        &embed.fields.iter().find(|o| o.name == name).unwrap().value
    }

    #[tokio::test]
    async fn new_upcoming_competition_is_announced() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let source = source(vec![worlds.clone()], vec![]);
        let channel = FakeChannel::default();

        let report = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();

        assert_eq!(report, SyncReport { upcoming: 1, ..Default::default() });
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);

        let (content, embed) = &sent[0];
        assert_eq!(content, MENTION);
        assert_eq!(embed.title.as_deref(), Some("Worlds 2025"));
        assert_eq!(embed.url.as_deref(), Some(worlds.url.as_str()));
        assert_eq!(embed.description.as_deref(), Some("This is a new upcoming competition."));
        assert_eq!(embed.colour, Some(GREEN));
        assert_eq!(field(embed, "Location"), "Tokyo");
        assert_eq!(field(embed, "Start Date"), "Wed Jan 01 2025");
        assert_eq!(field(embed, "End Date"), field(embed, "Start Date"));
    }

    #[tokio::test]
    async fn end_date_is_rendered_when_present() {
        let open = competition("Spring Open", (2025, 3, 14), Some((2025, 3, 16)));
        let embed = status_embed(&open, Phase::Upcoming, 0);

        assert_eq!(field(&embed, "Start Date"), "Fri Mar 14 2025");
        assert_eq!(field(&embed, "End Date"), "Sun Mar 16 2025");
        assert!(!embed.fields[0].inline);
        assert!(embed.fields[1].inline && embed.fields[2].inline);
    }

    #[tokio::test]
    async fn second_cycle_posts_nothing() {
        let source = source(
            vec![competition("A", (2025, 5, 1), None), competition("B", (2025, 6, 1), None)],
            vec![competition("C", (2025, 1, 1), Some((2025, 1, 2)))]
        );
        let channel = FakeChannel::default();

        let first = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();
        assert_eq!(first.posted(), 3);

        let second = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();
        assert_eq!(second, SyncReport::default());
        assert_eq!(channel.sent().len(), 3);
    }

    #[tokio::test]
    async fn started_competition_gets_new_post_and_keeps_upcoming_one() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let upcoming = status_embed(&worlds, Phase::Upcoming, 0);
        let channel = FakeChannel::with_embeds(vec![upcoming.clone()]);

        let report = run_sync_cycle(&source(vec![], vec![worlds]), &channel, MENTION, SyncOptions::default()).await.unwrap();

        assert_eq!(report, SyncReport { in_progress: 1, ..Default::default() });
        let sent = channel.sent();
        assert_eq!(sent[0].1.description.as_deref(), Some("This competition has started."));
        assert_eq!(sent[0].1.colour, Some(YELLOW));
        assert!(channel.edited.lock().unwrap().is_empty());
        assert!(channel.messages.lock().unwrap().iter().any(|o| o.embed.as_ref() == Some(&upcoming)));
    }

    #[tokio::test]
    async fn dropped_in_progress_competition_is_ended_once() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let original = started(&worlds);
        let channel = FakeChannel::with_embeds(vec![original.clone()]);
        let source = source(vec![], vec![]);

        let report = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();
        assert_eq!(report, SyncReport { ended: 1, ..Default::default() });

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, MENTION);
        assert_eq!(sent[0].1.description.as_deref(), Some("This competition has ended."));
        assert_eq!(sent[0].1.colour, Some(RED));
        assert_eq!(sent[0].1.title, original.title);
        assert_eq!(sent[0].1.fields, original.fields);

        // The started post is left alone.
        assert!(channel.edited.lock().unwrap().is_empty());
        let messages = channel.messages.lock().unwrap().clone();
        assert_eq!(messages.iter().find(|o| o.id == MessageId::new(1)).unwrap().embed.as_ref(), Some(&original));

        let again = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();
        assert_eq!(again, SyncReport::default());
    }

    #[tokio::test]
    async fn still_running_competition_is_not_ended() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), Some((2025, 1, 3)));
        let channel = FakeChannel::with_embeds(vec![started(&worlds)]);

        let report = run_sync_cycle(&source(vec![], vec![worlds]), &channel, MENTION, SyncOptions::default()).await.unwrap();

        assert_eq!(report, SyncReport::default());
    }

    #[tokio::test]
    async fn ended_can_edit_in_place() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let channel = FakeChannel::with_embeds(vec![started(&worlds)]);
        let options = SyncOptions { edit_ended_in_place: true };

        let report = run_sync_cycle(&source(vec![], vec![]), &channel, MENTION, options).await.unwrap();

        assert_eq!(report, SyncReport { ended: 1, ..Default::default() });
        assert!(channel.sent().is_empty());

        let edited = channel.edited.lock().unwrap().clone();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].0, MessageId::new(1));
        assert_eq!(edited[0].1.colour, Some(RED));
    }

    #[tokio::test]
    async fn failed_send_does_not_stop_the_rest() {
        let source = source(
            vec![competition("A", (2025, 5, 1), None), competition("B", (2025, 6, 1), None), competition("C", (2025, 7, 1), None)],
            vec![]
        );
        let channel = FakeChannel { fail_attempts: vec![2], ..Default::default() };

        let report = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();

        assert_eq!(report, SyncReport { upcoming: 2, failed: 1, ..Default::default() });
        let titles = channel.sent().into_iter().map(|(_, o)| o.title.unwrap()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn groups_are_sent_in_order() {
        let leaving = competition("Leaving", (2025, 1, 1), None);
        let channel = FakeChannel::with_embeds(vec![started(&leaving)]);
        let source = source(
            vec![competition("Up 1", (2025, 5, 1), None), competition("Up 2", (2025, 6, 1), None)],
            vec![competition("Live", (2025, 1, 2), None)]
        );

        run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await.unwrap();

        let titles = channel.sent().into_iter().map(|(_, o)| o.title.unwrap()).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Up 1", "Up 2", "Live", "Leaving"]);
    }

    #[tokio::test]
    async fn overlapping_cycles_post_once() {
        let lock = tokio::sync::Mutex::new(());
        let source = source(vec![competition("Worlds 2025", (2025, 1, 1), None)], vec![]);
        let channel = FakeChannel::default();

        let (first, second) = tokio::join!(
            run_exclusive(&lock, &source, &channel, MENTION, SyncOptions::default()),
            run_exclusive(&lock, &source, &channel, MENTION, SyncOptions::default())
        );

        assert_eq!(first.unwrap().posted() + second.unwrap().posted(), 1);
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn source_failure_aborts_without_posting() {
        let channel = FakeChannel::with_embeds(vec![started(&competition("Worlds 2025", (2025, 1, 1), None))]);

        let result = run_sync_cycle(&FakeSource { listings: None }, &channel, MENTION, SyncOptions::default()).await;

        assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn history_failure_aborts_without_posting() {
        let channel = FakeChannel { unreadable: true, ..Default::default() };
        let source = source(vec![competition("A", (2025, 5, 1), None)], vec![]);

        let result = run_sync_cycle(&source, &channel, MENTION, SyncOptions::default()).await;

        assert!(matches!(result, Err(SyncError::History(_))));
        assert!(channel.sent().is_empty());
    }

    #[test]
    fn identity_needs_exact_title_and_url() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let mut shouted = status_embed(&worlds, Phase::Upcoming, 0);
        shouted.title = Some("WORLDS 2025".to_string());
        let mut moved = status_embed(&worlds, Phase::Upcoming, 0);
        moved.url = Some(format!("{}/", worlds.url));

        let messages = vec![
            PostedMessage { id: MessageId::new(1), embed: Some(shouted) },
            PostedMessage { id: MessageId::new(2), embed: Some(moved) },
            PostedMessage { id: MessageId::new(3), embed: None }
        ];
        let listings = Listings { upcoming: vec![worlds], in_progress: vec![] };

        let plan = plan(&messages, &listings);

        assert_eq!(plan.new_upcoming.len(), 1);
        assert!(plan.new_in_progress.is_empty());
        assert!(plan.newly_ended.is_empty());
    }

    #[test]
    fn duplicate_started_posts_end_once() {
        let worlds = competition("Worlds 2025", (2025, 1, 1), None);
        let messages = vec![
            PostedMessage { id: MessageId::new(1), embed: Some(started(&worlds)) },
            PostedMessage { id: MessageId::new(2), embed: Some(started(&worlds)) }
        ];
        let listings = Listings::default();

        let plan = plan(&messages, &listings);

        assert_eq!(plan.newly_ended.len(), 1);
        assert_eq!(plan.newly_ended[0].message.id, MessageId::new(1));
    }

    #[test]
    fn unrelated_embeds_are_ignored() {
        let messages = vec![PostedMessage {
            id: MessageId::new(1),
            embed: Some(StatusEmbed {
                title: Some("Level Up!".to_string()),
                url: Some("https://example.org".to_string()),
                description: Some("Someone leveled up".to_string()),
                ..Default::default()
            })
        }];
        let listings = Listings::default();

        assert!(plan(&messages, &listings).is_empty());
    }
}
