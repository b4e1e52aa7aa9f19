//! Time expressions in scheduling requests
//!
//! Understands the phrasings people type into a chat box: relative days
//! ("tomorrow", "next friday", "in 3 days"), calendar dates ("Nov 21",
//! "2025-11-21", "12/5", "the 5th"),
//! clock times ("at 2", "2:30pm", "14:00", "noon"), ranges ("2-3pm") and
//! durations ("for 45 minutes", "an hour"). Clock times are read in the
//! user's UTC offset. A day reference that cannot be pinned down ("next
//! week", "13/45") is reported instead of falling back to today.

use super::lazy_regex;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use regex::{Captures, Regex};
use sdk::types::TimeWindow;
use std::sync::OnceLock;

/// Longest meeting a request can ask for
const MAX_DURATION_MINUTES: i64 = 12 * 60;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTime {
    pub date: Option<NaiveDate>,
    /// The words the date came from, for clarification messages
    pub date_phrase: Option<String>,
    /// A day reference that named no definite date
    pub unresolved_date: Option<String>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub duration: Option<Duration>,
}

impl ParsedTime {
    pub fn has_time(&self) -> bool {
        self.start.is_some()
    }

    /// Resolve to a UTC window. A time without any day reference means
    /// `today`; an unresolved day reference gives no window.
    pub fn window(
        &self,
        today: NaiveDate,
        offset: FixedOffset,
        default_duration: Duration,
    ) -> Option<TimeWindow> {
        let date = match (self.date, &self.unresolved_date) {
            (Some(date), _) => date,
            (None, Some(_)) => return None,
            (None, None) => today,
        };
        let start = to_utc(date, self.start?, offset)?;
        let fallback = start + self.duration.unwrap_or(default_duration);
        let end = match self.end {
            Some(end) => to_utc(date, end, offset)
                .filter(|e| *e > start)
                .unwrap_or(fallback),
            None => fallback,
        };
        TimeWindow::new(start, end).ok()
    }
}

/// Local date and time in `offset` to UTC
pub fn to_utc(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|t| t.with_timezone(&Utc))
}

/// The user's calendar day at `now`
pub fn local_today(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    now.with_timezone(&offset).date_naive()
}

pub fn parse(text: &str, today: NaiveDate) -> ParsedTime {
    let lower = text
        .to_lowercase()
        .replace("a.m.", "am")
        .replace("p.m.", "pm");

    let (date, date_phrase, unresolved_date) = match parse_date(&lower, today) {
        Some((date, phrase)) => (Some(date), Some(phrase), None),
        None => (None, None, vague_date(&lower)),
    };
    let (start, end) = match parse_clock(&lower) {
        Some((start, end)) => (Some(start), end),
        None => (None, None),
    };

    ParsedTime {
        date,
        date_phrase,
        unresolved_date,
        start,
        end,
        duration: parse_duration(&lower),
    }
}

static DAY_AFTER: OnceLock<Option<Regex>> = OnceLock::new();
static TOMORROW: OnceLock<Option<Regex>> = OnceLock::new();
static TODAY: OnceLock<Option<Regex>> = OnceLock::new();
static ISO_DATE: OnceLock<Option<Regex>> = OnceLock::new();
static MONTH_DAY: OnceLock<Option<Regex>> = OnceLock::new();
static DAY_MONTH: OnceLock<Option<Regex>> = OnceLock::new();
static WEEKDAY: OnceLock<Option<Regex>> = OnceLock::new();
static NUMERIC_DATE: OnceLock<Option<Regex>> = OnceLock::new();
static DAYS_AHEAD: OnceLock<Option<Regex>> = OnceLock::new();
static ORDINAL_DAY: OnceLock<Option<Regex>> = OnceLock::new();
static VAGUE_DATE: OnceLock<Option<Regex>> = OnceLock::new();

const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
const MONTH_PREFIXES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn parse_date(lower: &str, today: NaiveDate) -> Option<(NaiveDate, String)> {
    if let Some(m) = lazy_regex(&DAY_AFTER, r"\bday after tomorrow\b").and_then(|re| re.find(lower)) {
        return Some((today + Duration::days(2), m.as_str().to_string()));
    }
    if let Some(m) = lazy_regex(&TOMORROW, r"\btomorrow\b").and_then(|re| re.find(lower)) {
        return Some((today + Duration::days(1), m.as_str().to_string()));
    }
    if let Some(m) = lazy_regex(&TODAY, r"\b(today|tonight|this (morning|afternoon|evening))\b")
        .and_then(|re| re.find(lower))
    {
        return Some((today, m.as_str().to_string()));
    }

    if let Some(c) = lazy_regex(&ISO_DATE, r"\b(\d{4})-(\d{2})-(\d{2})\b").and_then(|re| re.captures(lower)) {
        let date = NaiveDate::from_ymd_opt(num(&c, 1)? as i32, num(&c, 2)?, num(&c, 3)?)?;
        return Some((date, c.get(0)?.as_str().to_string()));
    }

    let month_day = format!(r"\b({})\.?\s+(\d{{1,2}})(st|nd|rd|th)?\b", MONTHS);
    if let Some(c) = lazy_regex(&MONTH_DAY, &month_day).and_then(|re| re.captures(lower)) {
        let month = month_number(c.get(1)?.as_str())?;
        let date = upcoming_date(today, month, num(&c, 2)?)?;
        return Some((date, c.get(0)?.as_str().to_string()));
    }
    let day_month = format!(r"\b(\d{{1,2}})(st|nd|rd|th)?\s+(of\s+)?({})\b", MONTHS);
    if let Some(c) = lazy_regex(&DAY_MONTH, &day_month).and_then(|re| re.captures(lower)) {
        let month = month_number(c.get(4)?.as_str())?;
        let date = upcoming_date(today, month, num(&c, 1)?)?;
        return Some((date, c.get(0)?.as_str().to_string()));
    }

    // month/day, US order
    let numeric = r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b";
    if let Some(c) = lazy_regex(&NUMERIC_DATE, numeric).and_then(|re| re.captures(lower)) {
        let (month, day) = (num(&c, 1)?, num(&c, 2)?);
        let date = match c.get(3) {
            Some(year) => {
                let year: i32 = year.as_str().parse().ok()?;
                let year = if year < 100 { 2000 + year } else { year };
                NaiveDate::from_ymd_opt(year, month, day)
            }
            None => upcoming_date(today, month, day),
        };
        if let Some(date) = date {
            return Some((date, c.get(0)?.as_str().to_string()));
        }
    }

    let ahead = r"\bin\s+(\d{1,3}|a|an|one|two|three|four|five|six|seven)\s+(days?|weeks?)\b";
    if let Some(c) = lazy_regex(&DAYS_AHEAD, ahead).and_then(|re| re.captures(lower)) {
        let count: i64 = match c.get(1)?.as_str() {
            "a" | "an" | "one" => 1,
            "two" => 2,
            "three" => 3,
            "four" => 4,
            "five" => 5,
            "six" => 6,
            "seven" => 7,
            n => n.parse().ok()?,
        };
        let days = if c.get(2)?.as_str().starts_with("week") {
            count * 7
        } else {
            count
        };
        return Some((today + Duration::days(days), c.get(0)?.as_str().to_string()));
    }

    if let Some(c) = lazy_regex(&ORDINAL_DAY, r"\bthe\s+(\d{1,2})(st|nd|rd|th)\b").and_then(|re| re.captures(lower)) {
        let date = upcoming_day_of_month(today, num(&c, 1)?)?;
        return Some((date, c.get(0)?.as_str().to_string()));
    }

    let weekday = r"\b(next\s+|this\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b";
    if let Some(c) = lazy_regex(&WEEKDAY, weekday).and_then(|re| re.captures(lower)) {
        let target: Weekday = c.get(2)?.as_str().parse().ok()?;
        let this_week = c
            .get(1)
            .map(|m| m.as_str().trim() == "this")
            .unwrap_or(false);
        let mut ahead = (7 + target.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            % 7;
        if ahead == 0 && !this_week {
            ahead = 7;
        }
        return Some((today + Duration::days(ahead), c.get(0)?.as_str().trim().to_string()));
    }

    None
}

fn month_number(name: &str) -> Option<u32> {
    MONTH_PREFIXES
        .iter()
        .position(|m| name.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// `month/day` this year, or next year when that date has passed
fn upcoming_date(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(date)
    }
}

/// Next date (today included) falling on `day` of a month
fn upcoming_day_of_month(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (mut year, mut month) = (today.year(), today.month());
    // a 31st can be up to two months away
    for _ in 0..3 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day).filter(|d| *d >= today) {
            return Some(date);
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    None
}

/// Day references with no definite date
fn vague_date(lower: &str) -> Option<String> {
    let pattern = r"\b(?:(?:next|this|coming|following)\s+(?:week|month|weekend|year)|(?:the\s+)?weekend|end of (?:the\s+)?(?:week|month)|in\s+(?:a\s+)?(?:few|couple(?:\s+of)?)\s+(?:days|weeks)|\d{1,2}/\d{1,2}(?:/\d{2,4})?)\b";
    lazy_regex(&VAGUE_DATE, pattern)
        .and_then(|re| re.find(lower))
        .map(|m| m.as_str().to_string())
}

static RANGE: OnceLock<Option<Regex>> = OnceLock::new();
static RANGE_24H: OnceLock<Option<Regex>> = OnceLock::new();
static MERIDIEM: OnceLock<Option<Regex>> = OnceLock::new();
static CLOCK_24H: OnceLock<Option<Regex>> = OnceLock::new();
static BARE_AT: OnceLock<Option<Regex>> = OnceLock::new();
static NOON: OnceLock<Option<Regex>> = OnceLock::new();

/// Start time and, for ranges, end time
fn parse_clock(lower: &str) -> Option<(NaiveTime, Option<NaiveTime>)> {
    let range = r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)?\s*(?:-|–|to|until|till)\s*(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b";
    if let Some(c) = lazy_regex(&RANGE, range).and_then(|re| re.captures(lower)) {
        let end_meridiem = c.get(6)?.as_str();
        let end = with_meridiem(num(&c, 4)?, num(&c, 5).unwrap_or(0), end_meridiem)?;
        let start_hour = num(&c, 1)?;
        let start_minute = num(&c, 2).unwrap_or(0);
        let start = match c.get(3) {
            Some(m) => with_meridiem(start_hour, start_minute, m.as_str())?,
            // "11-1pm" starts in the morning
            None => with_meridiem(start_hour, start_minute, end_meridiem)
                .filter(|s| *s < end)
                .or_else(|| with_meridiem(start_hour, start_minute, "am"))?,
        };
        return Some((start, Some(end)));
    }

    let range_24h = r"\b([01]?\d|2[0-3]):([0-5]\d)\s*(?:-|–|to|until|till)\s*([01]?\d|2[0-3]):([0-5]\d)\b";
    if let Some(c) = lazy_regex(&RANGE_24H, range_24h).and_then(|re| re.captures(lower)) {
        let start = NaiveTime::from_hms_opt(num(&c, 1)?, num(&c, 2)?, 0)?;
        let end = NaiveTime::from_hms_opt(num(&c, 3)?, num(&c, 4)?, 0)?;
        return Some((start, Some(end)));
    }

    if let Some(c) = lazy_regex(&MERIDIEM, r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").and_then(|re| re.captures(lower)) {
        let time = with_meridiem(num(&c, 1)?, num(&c, 2).unwrap_or(0), c.get(3)?.as_str())?;
        return Some((time, None));
    }

    if let Some(c) = lazy_regex(&CLOCK_24H, r"\b([01]?\d|2[0-3]):([0-5]\d)\b").and_then(|re| re.captures(lower)) {
        let hour = num(&c, 1)?;
        let minute = num(&c, 2)?;
        let time = if hour <= 12 {
            bare_hour(hour, minute)?
        } else {
            NaiveTime::from_hms_opt(hour, minute, 0)?
        };
        return Some((time, None));
    }

    if let Some(m) = lazy_regex(&NOON, r"\b(noon|midday|midnight)\b").and_then(|re| re.find(lower)) {
        let hour = if m.as_str() == "midnight" { 0 } else { 12 };
        return Some((NaiveTime::from_hms_opt(hour, 0, 0)?, None));
    }

    if let Some(c) = lazy_regex(&BARE_AT, r"\b(?:at|@)\s*(\d{1,2})\b").and_then(|re| re.captures(lower)) {
        let hour = num(&c, 1)?;
        let time = if hour <= 12 {
            bare_hour(hour, 0)?
        } else {
            NaiveTime::from_hms_opt(hour, 0, 0)?
        };
        return Some((time, None));
    }

    None
}

fn with_meridiem(hour: u32, minute: u32, meridiem: &str) -> Option<NaiveTime> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (meridiem, hour) {
        ("am", 12) => 0,
        ("am", h) => h,
        (_, 12) => 12,
        (_, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// An hour with no am/pm: 1 through 7 are afternoon, 8 through 11 morning
fn bare_hour(hour: u32, minute: u32) -> Option<NaiveTime> {
    match hour {
        0 => NaiveTime::from_hms_opt(0, minute, 0),
        1..=7 => with_meridiem(hour, minute, "pm"),
        8..=11 => with_meridiem(hour, minute, "am"),
        _ => with_meridiem(hour, minute, "pm"),
    }
}

static HOUR_AND_HALF: OnceLock<Option<Regex>> = OnceLock::new();
static HALF_HOUR: OnceLock<Option<Regex>> = OnceLock::new();
static DURATION: OnceLock<Option<Regex>> = OnceLock::new();

fn parse_duration(lower: &str) -> Option<Duration> {
    if lazy_regex(&HOUR_AND_HALF, r"\b(an|one) hour and a half\b")
        .map(|re| re.is_match(lower))
        .unwrap_or(false)
    {
        return Some(Duration::minutes(90));
    }
    if lazy_regex(&HALF_HOUR, r"\bhalf (an )?hour\b")
        .map(|re| re.is_match(lower))
        .unwrap_or(false)
    {
        return Some(Duration::minutes(30));
    }

    let pattern = r"\b(in\s+)?(\d+(?:\.\d+)?|an?|one|two|three)\s*-?\s*(hours?|hrs?|minutes?|mins?)\b";
    let c = lazy_regex(&DURATION, pattern)?
        .captures_iter(lower)
        // "in 2 hours" is a start time, not a length
        .find(|c| c.get(1).is_none())?;
    let amount: f64 = match c.get(2)?.as_str() {
        "a" | "an" | "one" => 1.0,
        "two" => 2.0,
        "three" => 3.0,
        n => n.parse().ok()?,
    };
    let unit = c.get(3)?.as_str();
    let minutes = if unit.starts_with('h') {
        amount * 60.0
    } else {
        amount
    };
    let minutes = minutes.round() as i64;
    (1..=MAX_DURATION_MINUTES)
        .contains(&minutes)
        .then(|| Duration::minutes(minutes))
}

fn num(c: &Captures<'_>, group: usize) -> Option<u32> {
    c.get(group)?.as_str().parse().ok()
}
