//! Upcoming-event reminder
//!
//! Reads an iCalendar listing, picks the next event and renders a Polish
//! one-line summary that gets pinned in group conversations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use regex::Regex;
use reqwest::Client;

use super::Signal;
use crate::{Error, Result};

/// Default lead time for the "starting soon" variant
pub const DEFAULT_LEAD_TIME: Duration = Duration::from_secs(3 * 60 * 60);

/// How long an event still counts as upcoming after it started
const GRACE_AFTER_START_HOURS: i64 = 24;

const DAY_NAMES: [&str; 7] = [
    "poniedziałek",
    "wtorek",
    "środa",
    "czwartek",
    "piątek",
    "sobota",
    "niedziela",
];

const MONTH_NAMES: [&str; 12] = [
    "stycznia",
    "lutego",
    "marca",
    "kwietnia",
    "maja",
    "czerwca",
    "lipca",
    "sierpnia",
    "września",
    "października",
    "listopada",
    "grudnia",
];

/// A single calendar event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub title: String,
    /// Local wall-clock start
    pub start: NaiveDateTime,
    pub venue: Option<Venue>,
    pub url: Option<String>,
}

/// Where an event happens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    pub name: String,
    pub address: Option<String>,
}

impl Venue {
    fn is_online(&self) -> bool {
        self.name.eq_ignore_ascii_case("online event")
    }

    /// Parse an iCalendar `LOCATION` of the form `Name (street, city)`
    fn parse(location: &str) -> Option<Self> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }

        if let Some(stripped) = location.strip_suffix(')')
            && let Some((name, address)) = stripped.split_once(" (")
        {
            return Some(Self {
                name: name.trim().to_string(),
                address: Some(address.trim().to_string()).filter(|a| !a.is_empty()),
            });
        }

        Some(Self {
            name: location.to_string(),
            address: None,
        })
    }
}

/// Pick the earliest event that has not ended its grace period
#[must_use]
pub fn next_event<'a>(
    events: &'a [Event],
    now: NaiveDateTime,
    title_filter: Option<&Regex>,
) -> Option<&'a Event> {
    events
        .iter()
        .filter(|e| e.start + TimeDelta::hours(GRACE_AFTER_START_HOURS) > now)
        .filter(|e| title_filter.is_none_or(|re| re.is_match(&e.title)))
        .min_by_key(|e| e.start)
}

/// Render a date the way people write it in Polish
#[must_use]
pub fn describe_date(at: NaiveDateTime) -> String {
    let day = DAY_NAMES[at.weekday().num_days_from_monday() as usize];
    let month = MONTH_NAMES[at.month0() as usize];

    format!(
        "{day}, {} {month} {} o godz {}:{:02}",
        at.day(),
        at.year(),
        at.hour(),
        at.minute()
    )
}

/// Render the reminder for `event` as seen at `now`
#[must_use]
pub fn render_event(event: &Event, now: NaiveDateTime, lead_time: Duration) -> String {
    let place = match &event.venue {
        Some(venue) if venue.is_online() => " (telekonferencja)".to_string(),
        Some(venue) => match &venue.address {
            Some(address) => format!(" w {} ({address})", venue.name),
            None => format!(" w {}", venue.name),
        },
        None => String::new(),
    };

    let mut text = format!("Nast. spotkanie: {}{place}.", describe_date(event.start));
    if let Some(url) = &event.url {
        text.push_str(" Więcej szczegółów: ");
        text.push_str(url);
    }

    let lead = TimeDelta::from_std(lead_time).unwrap_or(TimeDelta::MAX);
    if event.start - now < lead {
        // "Nast." -> "Niedługo nast."
        text = format!("Niedługo n{}", &text[1..]);
    }

    text
}

/// Unfold continuation lines and split into `(name, params, value)` triples
fn content_lines(ics: &str) -> Vec<(String, String, String)> {
    let mut unfolded: Vec<String> = Vec::new();
    for raw in ics.lines() {
        let line = raw.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix([' ', '\t'])
            && let Some(last) = unfolded.last_mut()
        {
            last.push_str(rest);
        } else if !line.is_empty() {
            unfolded.push(line.to_string());
        }
    }

    unfolded
        .into_iter()
        .filter_map(|line| {
            let (head, value) = line.split_once(':')?;
            let (name, params) = head.split_once(';').unwrap_or((head, ""));
            Some((name.to_ascii_uppercase(), params.to_string(), value.to_string()))
        })
        .collect()
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_start(params: &str, value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    let bad = || Error::MalformedFeed(format!("invalid DTSTART: {value}"));

    if params.to_ascii_uppercase().contains("VALUE=DATE") || value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| bad())?;
        return date.and_hms_opt(0, 0, 0).ok_or_else(bad);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").map_err(|_| bad())?;
        let at: DateTime<Utc> = naive.and_utc();
        return Ok(at.with_timezone(&Local).naive_local());
    }

    // Floating or TZID-qualified times are taken as local wall-clock
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").map_err(|_| bad())
}

#[derive(Default)]
struct PartialEvent {
    title: Option<String>,
    start: Option<NaiveDateTime>,
    venue: Option<Venue>,
    url: Option<String>,
}

impl PartialEvent {
    fn finish(self) -> Option<Event> {
        let Some(start) = self.start else {
            tracing::warn!(title = ?self.title, "skipping event without usable DTSTART");
            return None;
        };
        Some(Event {
            title: self.title.unwrap_or_default(),
            start,
            venue: self.venue,
            url: self.url,
        })
    }
}

/// Parse the `VEVENT`s of an iCalendar document
///
/// # Errors
///
/// Returns `MalformedFeed` if the document is not a calendar. Events without
/// a readable start time are skipped.
pub fn parse_calendar(ics: &str) -> Result<Vec<Event>> {
    let lines = content_lines(ics);
    if !lines
        .iter()
        .any(|(name, _, value)| name == "BEGIN" && value.eq_ignore_ascii_case("VCALENDAR"))
    {
        return Err(Error::MalformedFeed("not an iCalendar document".to_string()));
    }

    let mut events = Vec::new();
    let mut current: Option<PartialEvent> = None;

    for (name, params, value) in lines {
        if name == "BEGIN" && value.eq_ignore_ascii_case("VEVENT") {
            current = Some(PartialEvent::default());
            continue;
        }
        let Some(partial) = current.as_mut() else {
            continue;
        };

        match name.as_str() {
            "END" if value.eq_ignore_ascii_case("VEVENT") => {
                events.extend(current.take().and_then(PartialEvent::finish));
            }
            "SUMMARY" => partial.title = Some(unescape_text(&value)),
            "DTSTART" => match parse_start(&params, &value) {
                Ok(start) => partial.start = Some(start),
                Err(e) => tracing::warn!(value = %value, error = %e, "unreadable DTSTART"),
            },
            "LOCATION" => partial.venue = Venue::parse(&unescape_text(&value)),
            "URL" => partial.url = Some(value.trim().to_string()),
            _ => {}
        }
    }

    Ok(events)
}

/// Reminder about the next scheduled meetup
pub struct EventReminder {
    client: Client,
    url: String,
    title_filter: Option<Regex>,
    lead_time: Duration,
}

impl EventReminder {
    /// Create a reminder reading the calendar at `url`
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            title_filter: None,
            lead_time: DEFAULT_LEAD_TIME,
        }
    }

    /// Only consider events whose title matches `filter`
    #[must_use]
    pub fn with_title_filter(mut self, filter: Option<Regex>) -> Self {
        self.title_filter = filter;
        self
    }

    /// Override the "starting soon" lead time
    #[must_use]
    pub const fn with_lead_time(mut self, lead_time: Duration) -> Self {
        self.lead_time = lead_time;
        self
    }

    async fn download(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("event calendar: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::SourceUnavailable(format!(
                "event calendar returned {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("event calendar: {e}")))
    }
}

#[async_trait]
impl Signal for EventReminder {
    /// Rendered reminder text
    type Value = String;

    fn name(&self) -> &'static str {
        "event-reminder"
    }

    async fn fetch(&self) -> Result<Option<String>> {
        let events = parse_calendar(&self.download().await?)?;
        let now = Local::now().naive_local();

        Ok(next_event(&events, now, self.title_filter.as_ref())
            .map(|event| render_event(event, now, self.lead_time)))
    }

    fn render(&self, value: &String, _previous: Option<&String>) -> Option<String> {
        Some(value.clone())
    }
}
