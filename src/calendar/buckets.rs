use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use super::{bucket_key, key_for_date, unit_count, BucketKey, Granularity};
use crate::snapshot::{ContributionRecord, RecordState};

/// Record counts for one bucket, split by lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub open: u64,
    pub merged: u64,
    pub closed: u64,
}

impl StateCounts {
    pub fn add(&mut self, state: RecordState) {
        match state {
            RecordState::Open => self.open += 1,
            RecordState::Merged => self.merged += 1,
            RecordState::Closed => self.closed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.open + self.merged + self.closed
    }
}

/// One entry of a gap-free time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    #[serde(flatten)]
    pub counts: StateCounts,
}

impl Bucket {
    pub fn label(&self) -> String {
        self.key.label()
    }
}

/// Sparse histogram of records by creation bucket.
pub fn bucket_records<'a, I>(records: I, granularity: Granularity) -> BTreeMap<BucketKey, StateCounts>
where
    I: IntoIterator<Item = &'a ContributionRecord>,
{
    let mut observed: BTreeMap<BucketKey, StateCounts> = BTreeMap::new();
    for record in records {
        observed
            .entry(bucket_key(record.created_at, granularity))
            .or_default()
            .add(record.state);
    }
    observed
}

/// Expand a sparse bucket map into a contiguous sequence.
///
/// Without `range` the sequence runs from the smallest to the largest
/// observed key of `granularity`. With `range` it covers the buckets
/// containing the inclusive dates, and observations outside it are ignored.
/// Missing units are synthesized with zero counts.
pub fn fill_gaps(
    observed: &BTreeMap<BucketKey, StateCounts>,
    granularity: Granularity,
    range: Option<(NaiveDate, NaiveDate)>,
) -> Vec<Bucket> {
    let (first, last) = match range {
        Some((start, end)) => {
            if end < start {
                return vec![];
            }
            (key_for_date(start, granularity), key_for_date(end, granularity))
        }
        None => {
            let mut keys = observed.keys().filter(|k| k.granularity() == granularity);
            let Some(first) = keys.next().copied() else {
                return vec![];
            };
            let last = keys.last().copied().unwrap_or(first);
            (first, last)
        }
    };

    let mut buckets = Vec::with_capacity(unit_count(&first, &last) as usize);
    let mut cursor = first;
    while cursor <= last {
        buckets.push(Bucket {
            key: cursor,
            counts: observed.get(&cursor).copied().unwrap_or_default(),
        });
        cursor = cursor.advance();
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::record;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_bucket_records_splits_by_state() {
        let records = vec![
            record("a", "g/r", "2025-01-06T10:00:00Z").merged("2025-01-07T10:00:00Z"),
            record("b", "g/r", "2025-01-07T10:00:00Z"),
            record("c", "g/r", "2025-01-20T10:00:00Z").closed(),
        ];
        let observed = bucket_records(&records, Granularity::Week);
        assert_eq!(observed.len(), 2);
        let first = observed[&BucketKey::Week(d(2025, 1, 6))];
        assert_eq!(first, StateCounts { open: 1, merged: 1, closed: 0 });
        assert_eq!(observed[&BucketKey::Week(d(2025, 1, 20))].closed, 1);
    }

    #[test]
    fn test_fill_gaps_sparse_months() {
        let mut observed = BTreeMap::new();
        observed.insert(BucketKey::Month(2024, 11), StateCounts { open: 2, merged: 0, closed: 0 });
        observed.insert(BucketKey::Month(2025, 3), StateCounts { open: 0, merged: 5, closed: 1 });

        let buckets = fill_gaps(&observed, Granularity::Month, None);
        let keys: Vec<String> = buckets.iter().map(|b| b.key.to_string()).collect();
        assert_eq!(keys, ["2024-11", "2024-12", "2025-01", "2025-02", "2025-03"]);
        assert_eq!(buckets.len() as i64, unit_count(&BucketKey::Month(2024, 11), &BucketKey::Month(2025, 3)));
        assert_eq!(buckets[1].counts.total(), 0);
        assert_eq!(buckets[4].counts.merged, 5);
    }

    #[test]
    fn test_fill_gaps_weeks_across_year_end() {
        let mut observed = BTreeMap::new();
        observed.insert(BucketKey::Week(d(2024, 12, 23)), StateCounts { open: 1, ..Default::default() });
        observed.insert(BucketKey::Week(d(2025, 1, 13)), StateCounts { open: 1, ..Default::default() });

        let buckets = fill_gaps(&observed, Granularity::Week, None);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[1].key, BucketKey::Week(d(2024, 12, 30)));
        assert_eq!(buckets[2].key, BucketKey::Week(d(2025, 1, 6)));
    }

    #[test]
    fn test_fill_gaps_with_range_override() {
        let mut observed = BTreeMap::new();
        observed.insert(BucketKey::Day(d(2025, 1, 2)), StateCounts { open: 3, ..Default::default() });
        observed.insert(BucketKey::Day(d(2025, 2, 1)), StateCounts { open: 9, ..Default::default() });

        let buckets = fill_gaps(&observed, Granularity::Day, Some((d(2025, 1, 1), d(2025, 1, 5))));
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[1].counts.open, 3);
        assert_eq!(buckets.iter().map(|b| b.counts.total()).sum::<u64>(), 3);
    }

    #[test]
    fn test_fill_gaps_empty() {
        let observed = BTreeMap::new();
        assert!(fill_gaps(&observed, Granularity::Day, None).is_empty());
        assert!(fill_gaps(&observed, Granularity::Day, Some((d(2025, 1, 5), d(2025, 1, 1)))).is_empty());
    }

    #[test]
    fn test_fill_gaps_ignores_other_granularity() {
        let mut observed = BTreeMap::new();
        observed.insert(BucketKey::Year(2020), StateCounts { open: 1, ..Default::default() });
        observed.insert(BucketKey::Month(2025, 1), StateCounts { open: 1, ..Default::default() });
        let buckets = fill_gaps(&observed, Granularity::Month, None);
        assert_eq!(buckets.len(), 1);
    }

    #[test]
    fn test_fill_gaps_is_idempotent() {
        let records = vec![
            record("a", "g/r", "2025-01-01T00:00:00Z"),
            record("a", "g/r", "2025-01-09T00:00:00Z"),
        ];
        let observed = bucket_records(&records, Granularity::Day);
        let once = fill_gaps(&observed, Granularity::Day, None);
        let refilled: BTreeMap<BucketKey, StateCounts> =
            once.iter().map(|b| (b.key, b.counts)).collect();
        let twice = fill_gaps(&refilled, Granularity::Day, None);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 9);
    }
}
