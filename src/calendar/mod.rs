pub mod buckets;

pub use buckets::{bucket_records, fill_gaps, Bucket, StateCounts};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::date_util::{days_inclusive, last_day_of_month, monday_of, parse_date, utc_date};
use crate::error::{Error, Result};

/// Bucket size for time series and periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Pick a granularity for a custom inclusive range by its length:
    /// up to 14 days → day, up to 90 → week, up to 730 → month, else year.
    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        match days_inclusive(start, end) {
            0..=14 => Granularity::Day,
            15..=90 => Granularity::Week,
            91..=730 => Granularity::Month,
            _ => Granularity::Year,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(Error::PeriodParse(format!("unknown granularity: {other}"))),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A calendar-aligned bucket key.
///
/// Keys of the same granularity order chronologically. Comparing keys of
/// different granularities is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Day(NaiveDate),
    /// Monday of the ISO week.
    Week(NaiveDate),
    Month(i32, u32),
    Year(i32),
}

/// Key of the bucket containing `ts` at `granularity`.
pub fn bucket_key(ts: DateTime<Utc>, granularity: Granularity) -> BucketKey {
    key_for_date(utc_date(ts), granularity)
}

/// Key of the bucket containing the calendar date `d`.
pub fn key_for_date(d: NaiveDate, granularity: Granularity) -> BucketKey {
    match granularity {
        Granularity::Day => BucketKey::Day(d),
        Granularity::Week => BucketKey::Week(monday_of(d)),
        Granularity::Month => BucketKey::Month(d.year(), d.month()),
        Granularity::Year => BucketKey::Year(d.year()),
    }
}

/// Key of the bucket containing `now`, in UTC.
pub fn current_key(granularity: Granularity, now: DateTime<Utc>) -> BucketKey {
    bucket_key(now, granularity)
}

/// Inclusive number of calendar units from `first` to `last`.
///
/// Returns 0 when the keys differ in granularity or `last` precedes `first`.
pub fn unit_count(first: &BucketKey, last: &BucketKey) -> i64 {
    let n = match (first, last) {
        (BucketKey::Day(a), BucketKey::Day(b)) => (*b - *a).num_days() + 1,
        (BucketKey::Week(a), BucketKey::Week(b)) => (*b - *a).num_days() / 7 + 1,
        (BucketKey::Month(y1, m1), BucketKey::Month(y2, m2)) => {
            (*y2 as i64 * 12 + *m2 as i64) - (*y1 as i64 * 12 + *m1 as i64) + 1
        }
        (BucketKey::Year(a), BucketKey::Year(b)) => (*b - *a) as i64 + 1,
        _ => 0,
    };
    n.max(0)
}

impl BucketKey {
    pub fn granularity(&self) -> Granularity {
        match self {
            BucketKey::Day(_) => Granularity::Day,
            BucketKey::Week(_) => Granularity::Week,
            BucketKey::Month(..) => Granularity::Month,
            BucketKey::Year(_) => Granularity::Year,
        }
    }

    /// Parse the canonical string form for the given granularity.
    pub fn parse(s: &str, granularity: Granularity) -> Result<Self> {
        let s = s.trim();
        let bad = || Error::PeriodParse(format!("invalid {granularity} key: {s}"));
        match granularity {
            Granularity::Day => parse_date(s).map(BucketKey::Day).ok_or_else(bad),
            Granularity::Week => {
                let d = parse_date(s).ok_or_else(bad)?;
                // Any date is accepted and snapped to its Monday.
                Ok(BucketKey::Week(monday_of(d)))
            }
            Granularity::Month => {
                let (y, m) = s.split_once('-').ok_or_else(bad)?;
                let year: i32 = y.parse().map_err(|_| bad())?;
                let month: u32 = m.parse().map_err(|_| bad())?;
                if !(1..=12).contains(&month) || y.len() != 4 || m.len() != 2 {
                    return Err(bad());
                }
                Ok(BucketKey::Month(year, month))
            }
            Granularity::Year => {
                if s.len() != 4 {
                    return Err(bad());
                }
                s.parse().map(BucketKey::Year).map_err(|_| bad())
            }
        }
    }

    /// The next bucket of the same granularity.
    pub fn advance(&self) -> Self {
        match *self {
            BucketKey::Day(d) => BucketKey::Day(d + Duration::days(1)),
            BucketKey::Week(d) => BucketKey::Week(d + Duration::days(7)),
            BucketKey::Month(y, 12) => BucketKey::Month(y + 1, 1),
            BucketKey::Month(y, m) => BucketKey::Month(y, m + 1),
            BucketKey::Year(y) => BucketKey::Year(y + 1),
        }
    }

    /// The previous bucket of the same granularity.
    pub fn retreat(&self) -> Self {
        match *self {
            BucketKey::Day(d) => BucketKey::Day(d - Duration::days(1)),
            BucketKey::Week(d) => BucketKey::Week(d - Duration::days(7)),
            BucketKey::Month(y, 1) => BucketKey::Month(y - 1, 12),
            BucketKey::Month(y, m) => BucketKey::Month(y, m - 1),
            BucketKey::Year(y) => BucketKey::Year(y - 1),
        }
    }

    /// First calendar day covered by this bucket.
    pub fn start_date(&self) -> NaiveDate {
        match *self {
            BucketKey::Day(d) | BucketKey::Week(d) => d,
            BucketKey::Month(y, m) => NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN),
            BucketKey::Year(y) => NaiveDate::from_ymd_opt(y, 1, 1).unwrap_or(NaiveDate::MIN),
        }
    }

    /// Last calendar day covered by this bucket (inclusive).
    pub fn end_date(&self) -> NaiveDate {
        match *self {
            BucketKey::Day(d) => d,
            BucketKey::Week(d) => d + Duration::days(6),
            BucketKey::Month(y, m) => last_day_of_month(y, m),
            BucketKey::Year(y) => NaiveDate::from_ymd_opt(y, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.start_date() && d <= self.end_date()
    }

    /// Human-readable label, e.g. `Jan 6 - Jan 12, 2025` for a week.
    pub fn label(&self) -> String {
        match *self {
            BucketKey::Day(d) => d.format("%b %-d, %Y").to_string(),
            BucketKey::Week(start) => {
                let end = self.end_date();
                if start.year() == end.year() {
                    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
                } else {
                    format!(
                        "{} - {}",
                        start.format("%b %-d, %Y"),
                        end.format("%b %-d, %Y")
                    )
                }
            }
            BucketKey::Month(..) => self.start_date().format("%B %Y").to_string(),
            BucketKey::Year(y) => format!("{y}"),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Day(d) | BucketKey::Week(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            BucketKey::Month(y, m) => write!(f, "{y:04}-{m:02}"),
            BucketKey::Year(y) => write!(f, "{y:04}"),
        }
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, TimeZone, Weekday};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ts(y: i32, m: u32, day: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, h, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_key_formats() {
        let t = ts(2025, 3, 5, 12); // Wednesday
        assert_eq!(bucket_key(t, Granularity::Day).to_string(), "2025-03-05");
        assert_eq!(bucket_key(t, Granularity::Week).to_string(), "2025-03-03");
        assert_eq!(bucket_key(t, Granularity::Month).to_string(), "2025-03");
        assert_eq!(bucket_key(t, Granularity::Year).to_string(), "2025");
    }

    #[test]
    fn test_bucket_key_uses_utc_date() {
        // 23:30 on Sunday in UTC-5 is already Monday in UTC
        let local = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let t = local
            .with_ymd_and_hms(2025, 3, 9, 23, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(bucket_key(t, Granularity::Day), BucketKey::Day(d(2025, 3, 10)));
        assert_eq!(bucket_key(t, Granularity::Week), BucketKey::Week(d(2025, 3, 10)));
    }

    #[test]
    fn test_week_key_is_monday() {
        for day in 1..=31 {
            let key = key_for_date(d(2025, 1, day), Granularity::Week);
            match key {
                BucketKey::Week(m) => assert_eq!(m.weekday(), Weekday::Mon),
                other => panic!("expected week key, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_advance_matches_next_unit() {
        let cases = [
            (ts(2024, 12, 31, 0), Granularity::Day),
            (ts(2024, 2, 28, 0), Granularity::Day),
            (ts(2024, 12, 30, 0), Granularity::Week),
            (ts(2025, 12, 29, 0), Granularity::Week),
        ];
        for (t, g) in cases {
            let unit = if g == Granularity::Day { 1 } else { 7 };
            assert_eq!(
                bucket_key(t, g).advance(),
                bucket_key(t + Duration::days(unit), g),
                "granularity {g} at {t}"
            );
        }

        for t in [ts(2024, 1, 1, 0), ts(2024, 12, 1, 0), ts(2025, 2, 1, 0)] {
            let next = t.checked_add_months(Months::new(1)).unwrap();
            assert_eq!(
                bucket_key(t, Granularity::Month).advance(),
                bucket_key(next, Granularity::Month)
            );
            let next_year = t.checked_add_months(Months::new(12)).unwrap();
            assert_eq!(
                bucket_key(t, Granularity::Year).advance(),
                bucket_key(next_year, Granularity::Year)
            );
        }
    }

    #[test]
    fn test_retreat_inverts_advance() {
        let keys = [
            BucketKey::Day(d(2025, 3, 1)),
            BucketKey::Week(d(2025, 1, 6)),
            BucketKey::Month(2025, 1),
            BucketKey::Year(2025),
        ];
        for k in keys {
            assert_eq!(k.advance().retreat(), k);
            assert_eq!(k.retreat().advance(), k);
        }
        assert_eq!(BucketKey::Month(2025, 1).retreat(), BucketKey::Month(2024, 12));
        assert_eq!(BucketKey::Month(2024, 12).advance(), BucketKey::Month(2025, 1));
    }

    #[test]
    fn test_labels() {
        assert_eq!(BucketKey::Day(d(2025, 1, 6)).label(), "Jan 6, 2025");
        assert_eq!(BucketKey::Week(d(2025, 1, 6)).label(), "Jan 6 - Jan 12, 2025");
        assert_eq!(
            BucketKey::Week(d(2024, 12, 30)).label(),
            "Dec 30, 2024 - Jan 5, 2025"
        );
        assert_eq!(BucketKey::Month(2025, 2).label(), "February 2025");
        assert_eq!(BucketKey::Year(2025).label(), "2025");
    }

    #[test]
    fn test_parse_round_trips_display() {
        let keys = [
            BucketKey::Day(d(2025, 3, 1)),
            BucketKey::Week(d(2025, 1, 6)),
            BucketKey::Month(2025, 1),
            BucketKey::Year(2025),
        ];
        for k in keys {
            assert_eq!(BucketKey::parse(&k.to_string(), k.granularity()).unwrap(), k);
        }
    }

    #[test]
    fn test_parse_invalid_keys() {
        assert!(BucketKey::parse("2025-13", Granularity::Month).is_err());
        assert!(BucketKey::parse("2025-1", Granularity::Month).is_err());
        assert!(BucketKey::parse("25", Granularity::Year).is_err());
        assert!(BucketKey::parse("2025-02-30", Granularity::Day).is_err());
    }

    #[test]
    fn test_week_parse_snaps_to_monday() {
        assert_eq!(
            BucketKey::parse("2025-01-08", Granularity::Week).unwrap(),
            BucketKey::Week(d(2025, 1, 6))
        );
    }

    #[test]
    fn test_granularity_for_range() {
        assert_eq!(Granularity::for_range(d(2025, 1, 1), d(2025, 1, 5)), Granularity::Day);
        assert_eq!(Granularity::for_range(d(2025, 1, 1), d(2025, 1, 14)), Granularity::Day);
        assert_eq!(Granularity::for_range(d(2025, 1, 1), d(2025, 1, 15)), Granularity::Week);
        assert_eq!(Granularity::for_range(d(2025, 1, 1), d(2025, 3, 31)), Granularity::Week);
        assert_eq!(Granularity::for_range(d(2025, 1, 1), d(2026, 2, 4)), Granularity::Month);
        assert_eq!(Granularity::for_range(d(2020, 1, 1), d(2025, 1, 1)), Granularity::Year);
    }

    #[test]
    fn test_unit_count() {
        assert_eq!(unit_count(&BucketKey::Month(2024, 11), &BucketKey::Month(2025, 2)), 4);
        assert_eq!(
            unit_count(&BucketKey::Week(d(2024, 12, 30)), &BucketKey::Week(d(2025, 1, 13))),
            3
        );
        assert_eq!(unit_count(&BucketKey::Year(2025), &BucketKey::Year(2024)), 0);
        assert_eq!(unit_count(&BucketKey::Year(2025), &BucketKey::Month(2025, 1)), 0);
    }

    #[test]
    fn test_key_bounds() {
        let k = BucketKey::Month(2024, 2);
        assert_eq!(k.start_date(), d(2024, 2, 1));
        assert_eq!(k.end_date(), d(2024, 2, 29));
        assert!(k.contains(d(2024, 2, 29)));
        assert!(!k.contains(d(2024, 3, 1)));
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("Week".parse::<Granularity>().unwrap(), Granularity::Week);
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
