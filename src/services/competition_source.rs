use async_trait::async_trait;
use chrono::{Month, NaiveDate};
use scraper::error::SelectorErrorKind;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use crate::models::competition::{Competition, DateRange};

pub const BASE_URL: &str = "https://www.worldcubeassociation.org";

const UPCOMING_SELECTOR: &str = "#upcoming-comps .list-group .list-group-item.not-past";
const IN_PROGRESS_SELECTOR: &str = "#in-progress-comps .list-group .list-group-item.not-past";

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("http request failed for {url}: {source}")]
    Http {
        url: String,
        source: reqwest::Error
    },

    #[error("unexpected status {status} for {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode
    },

    #[error("failed to read response body from {url}: {source}")]
    ResponseBody {
        url: String,
        source: reqwest::Error
    },

    #[error("invalid CSS selector: {0}")]
    Selector(String),

    #[error("page has no competition listings, did the website change layout?")]
    UnexpectedLayout
}

impl<'a> From<SelectorErrorKind<'a>> for SourceError {
    fn from(err: SelectorErrorKind<'a>) -> Self {
        SourceError::Selector(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listings {
    pub upcoming: Vec<Competition>,
    pub in_progress: Vec<Competition>
}

#[async_trait]
pub trait CompetitionSource {
    /// Current and future competitions only; past ones are never listed.
    async fn fetch_competitions(&self) -> Result<Listings, SourceError>;
}

pub struct WcaSource {
    client: reqwest::Client,
    url: String
}

impl WcaSource {
    pub fn new() -> Result<WcaSource, SourceError> {
        let url = format!("{BASE_URL}/competitions");
        let client = reqwest::Client::builder()
            .user_agent(concat!("irontimer-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SourceError::Http { url: url.clone(), source })?;

        Ok(WcaSource { client, url })
    }
}

#[async_trait]
impl CompetitionSource for WcaSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_competitions(&self) -> Result<Listings, SourceError> {
        let response = self.client.get(&self.url).send().await
            .map_err(|source| SourceError::Http { url: self.url.clone(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::UnexpectedStatus { url: self.url.clone(), status });
        }

        let body = response.text().await
            .map_err(|source| SourceError::ResponseBody { url: self.url.clone(), source })?;

        let listings = parse_competitions(&body)?;
        debug!(upcoming = listings.upcoming.len(), in_progress = listings.in_progress.len(), "parsed competitions page");

        Ok(listings)
    }
}

pub fn parse_competitions(data: &str) -> Result<Listings, SourceError> {
    let page = Html::parse_document(data);

    let upcoming_section = Selector::parse("#upcoming-comps")?;
    let in_progress_section = Selector::parse("#in-progress-comps")?;

    if page.select(&upcoming_section).next().is_none() && page.select(&in_progress_section).next().is_none() {
        return Err(SourceError::UnexpectedLayout);
    }

    let upcoming = Selector::parse(UPCOMING_SELECTOR)?;
    let in_progress = Selector::parse(IN_PROGRESS_SELECTOR)?;
    let entry = EntrySelectors::new()?;

    Ok(Listings {
        upcoming: page.select(&upcoming).filter_map(|o| entry.competition(o)).collect(),
        in_progress: page.select(&in_progress).filter_map(|o| entry.competition(o)).collect()
    })
}

struct EntrySelectors {
    date: Selector,
    link: Selector,
    location: Selector
}

impl EntrySelectors {
    fn new() -> Result<EntrySelectors, SourceError> {
        Ok(EntrySelectors {
            date: Selector::parse(".date")?,
            link: Selector::parse(".competition-info .competition-link a")?,
            location: Selector::parse(".competition-info .location")?
        })
    }

    fn competition(&self, element: ElementRef) -> Option<Competition> {
        let link = element.select(&self.link).next();

        let name = link.map(element_text);
        let href = link.and_then(|o| o.value().attr("href")).map(|o| o.trim().to_string());
        let date_string = element.select(&self.date).next().map(element_text);
        let location = element.select(&self.location).next().map(element_text);

        let (Some(name), Some(href), Some(date_string), Some(location)) = (name, href, date_string, location) else {
            debug!("Skipping competition entry with missing fields");
            return None;
        };

        let Some(dates) = parse_dates(&date_string) else {
            debug!(name = %name, dates = %date_string, "Skipping competition with unreadable dates");
            return None;
        };

        Some(Competition {
            name,
            dates,
            location,
            url: absolute_url(&href)
        })
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{BASE_URL}{href}")
    }
}

fn month_day(month: &str, day: &str, year: i32) -> Option<NaiveDate> {
    let month = month.parse::<Month>().ok()?;
    let day = day.parse::<u32>().ok()?;

    NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
}

/// Reads `Jan 5, 2025`, `Jan 5 - 7, 2025`, `Jan 31 - Feb 2, 2025` and
/// `Dec 30, 2024 - Jan 1, 2025`.
pub fn parse_dates(date_string: &str) -> Option<DateRange> {
    let normalized = date_string.replace(',', " ").replace(['-', '–'], " - ");
    let tokens = normalized.split_whitespace().collect::<Vec<_>>();

    match tokens.as_slice() {
        [month, day, year] => {
            let year = year.parse().ok()?;
            Some(DateRange::single(month_day(month, day, year)?))
        }
        [month, start, "-", end, year] => {
            let year = year.parse().ok()?;
            range(month_day(month, start, year)?, month_day(month, end, year)?)
        }
        [start_month, start, "-", end_month, end, year] => {
            let year = year.parse().ok()?;
            range(month_day(start_month, start, year)?, month_day(end_month, end, year)?)
        }
        [start_month, start, start_year, "-", end_month, end, end_year] => {
            let start_year = start_year.parse().ok()?;
            let end_year = end_year.parse().ok()?;
            range(month_day(start_month, start, start_year)?, month_day(end_month, end, end_year)?)
        }
        _ => None
    }
}

fn range(start: NaiveDate, end: NaiveDate) -> Option<DateRange> {
    if end < start {
        return None;
    }

    Some(DateRange { start, end: Some(end) })
}
