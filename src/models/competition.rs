use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>
}

impl DateRange {
    pub fn single(start: NaiveDate) -> DateRange {
        DateRange { start, end: None }
    }

    /// Single-day events end on the day they start.
    pub fn end_or_start(&self) -> NaiveDate {
        self.end.unwrap_or(self.start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competition {
    pub name: String,
    pub dates: DateRange,
    pub location: String,
    pub url: String
}

impl Competition {
    pub fn is_same(&self, title: &str, url: &str) -> bool {
        self.name == title && self.url == url
    }
}

/// Renders as `Wed Jan 01 2025`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}
