use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use regex::Regex;

use crate::calendar::{current_key, key_for_date, BucketKey, Granularity};
use crate::date_util::{last_day_of_month, monday_of, parse_date, utc_date};
use crate::error::{Error, Result};
use crate::snapshot::ContributionRecord;

static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// The selected time window for metrics and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day(NaiveDate),
    /// ISO week, identified by its Monday.
    Week(NaiveDate),
    Month(i32, u32),
    Year(i32),
    /// Inclusive date range chosen by the user.
    Custom(NaiveDate, NaiveDate),
}

impl Period {
    /// Parse a period string relative to the present moment (UTC).
    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_at(s, Utc::now())
    }

    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `2025-01-06`: day
    /// - `2025-W05`: ISO week
    /// - `2025-01`: month
    /// - `2025`: year
    /// - `2025-01-01..2025-02-15`: custom inclusive range
    /// - `today`, `this-week`, `this-month`, `this-year` (or just `day`,
    ///   `week`, `month`, `year`): the current period at that granularity
    pub fn parse_at(s: &str, now: DateTime<Utc>) -> Result<Self> {
        let s = s.trim();

        let current = match s.to_lowercase().as_str() {
            "today" | "day" => Some(Granularity::Day),
            "this-week" | "week" => Some(Granularity::Week),
            "this-month" | "month" => Some(Granularity::Month),
            "this-year" | "year" => Some(Granularity::Year),
            _ => None,
        };
        if let Some(g) = current {
            return Ok(Period::current(g, now));
        }

        // Custom: "2025-01-01..2025-02-15"
        if let Some((a, b)) = s.split_once("..") {
            let start = parse_date(a)
                .ok_or_else(|| Error::PeriodParse(format!("invalid range start: {s}")))?;
            let end = parse_date(b)
                .ok_or_else(|| Error::PeriodParse(format!("invalid range end: {s}")))?;
            return Period::custom(start, end);
        }

        // Year: "2025"
        if s.len() == 4 {
            if let Ok(year) = s.parse::<i32>() {
                return Ok(Period::Year(year));
            }
        }

        // Week: "2025-W05"
        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let week: u32 = caps[2].parse().unwrap();
            if let Some(monday) = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon) {
                return Ok(Period::Week(monday));
            }
        }

        // Month: "2025-01"
        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u32 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        // Day: "2025-01-06"
        if let Some(d) = parse_date(s) {
            return Ok(Period::Day(d));
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// A custom range; `end` must not precede `start`.
    pub fn custom(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidRange(format!("{start} is after {end}")));
        }
        Ok(Period::Custom(start, end))
    }

    /// The period containing `now` at the given granularity.
    pub fn current(granularity: Granularity, now: DateTime<Utc>) -> Self {
        Period::from_bucket(current_key(granularity, now))
    }

    pub fn from_bucket(key: BucketKey) -> Self {
        match key {
            BucketKey::Day(d) => Period::Day(d),
            BucketKey::Week(d) => Period::Week(d),
            BucketKey::Month(y, m) => Period::Month(y, m),
            BucketKey::Year(y) => Period::Year(y),
        }
    }

    /// The bucket this period corresponds to; custom ranges have none.
    pub fn bucket(&self) -> Option<BucketKey> {
        match *self {
            Period::Day(d) => Some(BucketKey::Day(d)),
            Period::Week(d) => Some(key_for_date(d, Granularity::Week)),
            Period::Month(y, m) => Some(BucketKey::Month(y, m)),
            Period::Year(y) => Some(BucketKey::Year(y)),
            Period::Custom(..) => None,
        }
    }

    /// Granularity of the period; custom ranges pick one by length.
    pub fn granularity(&self) -> Granularity {
        match *self {
            Period::Day(_) => Granularity::Day,
            Period::Week(_) => Granularity::Week,
            Period::Month(..) => Granularity::Month,
            Period::Year(_) => Granularity::Year,
            Period::Custom(start, end) => Granularity::for_range(start, end),
        }
    }

    /// Convert to a canonical key string.
    pub fn to_key(&self) -> String {
        match *self {
            Period::Day(d) => d.format("%Y-%m-%d").to_string(),
            Period::Week(d) => {
                let iw = monday_of(d).iso_week();
                format!("{}-W{:02}", iw.year(), iw.week())
            }
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Year(y) => format!("{y}"),
            Period::Custom(s, e) => format!("{}..{}", s.format("%Y-%m-%d"), e.format("%Y-%m-%d")),
        }
    }

    /// Get the date range (inclusive start, inclusive end) for this period.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        match *self {
            Period::Day(d) => (d, d),
            Period::Week(d) => {
                let monday = monday_of(d);
                (monday, monday + Duration::days(6))
            }
            Period::Month(y, m) => (
                NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN),
                last_day_of_month(y, m),
            ),
            Period::Year(y) => (
                NaiveDate::from_ymd_opt(y, 1, 1).unwrap_or(NaiveDate::MIN),
                NaiveDate::from_ymd_opt(y, 12, 31).unwrap_or(NaiveDate::MAX),
            ),
            Period::Custom(s, e) => (s, e),
        }
    }

    /// Get the previous period of the same type. Custom ranges have no
    /// canonical predecessor.
    pub fn previous(&self) -> Option<Self> {
        self.bucket().map(|key| Period::from_bucket(key.retreat()))
    }

    pub fn contains_date(&self, d: NaiveDate) -> bool {
        let (start, end) = self.date_range();
        d >= start && d <= end
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.contains_date(utc_date(ts))
    }

    /// Returns true if this period contains `now`.
    pub fn is_current_at(&self, now: DateTime<Utc>) -> bool {
        self.contains(now)
    }

    /// Records created within this period, in input order.
    pub fn select<'a>(&self, records: &[&'a ContributionRecord]) -> Vec<&'a ContributionRecord> {
        records
            .iter()
            .copied()
            .filter(|r| self.contains(r.created_at))
            .collect()
    }

    /// Human-readable label.
    pub fn label(&self) -> String {
        match (*self, self.bucket()) {
            (_, Some(key)) => key.label(),
            (Period::Custom(s, e), None) => {
                format!("{} - {}", s.format("%b %-d, %Y"), e.format("%b %-d, %Y"))
            }
            (_, None) => self.to_key(),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}
