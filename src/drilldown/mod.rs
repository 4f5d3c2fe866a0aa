use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::aggregate::{aggregate, AggregateScope};
use crate::calendar::{bucket_records, fill_gaps, Bucket, Granularity};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics::{team_aggregate, TeamAggregate};
use crate::snapshot::ContributionRecord;
use crate::url::repository_name;

/// Records of one repository with their own team indicators.
#[derive(Debug, Clone, Serialize)]
pub struct RepoGroup<'a> {
    pub repository: String,
    pub name: String,
    #[serde(skip)]
    pub records: Vec<&'a ContributionRecord>,
    pub aggregate: TeamAggregate,
}

/// Partition records by repository, largest group first. Groups of equal
/// size keep the order in which their repository first appeared.
pub fn group_by_repo<'a>(
    records: &[&'a ContributionRecord],
    scope: &AggregateScope,
    config: &Config,
) -> Vec<RepoGroup<'a>> {
    let mut order: Vec<(&'a str, Vec<&'a ContributionRecord>)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    for &record in records {
        let repo = record.repository.as_str();
        let slot = *index.entry(repo).or_insert_with(|| {
            order.push((repo, Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(record);
    }
    // Stable sort keeps first-appearance order among ties.
    order.sort_by(|(_, a), (_, b)| b.len().cmp(&a.len()));

    order
        .into_iter()
        .map(|(repo, group)| {
            let contributors = aggregate(&group, scope);
            RepoGroup {
                repository: repo.to_string(),
                name: repository_name(repo).to_string(),
                aggregate: team_aggregate(&group, &contributors, scope, config),
                records: group,
            }
        })
        .collect()
}

/// Five-number summary of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Distribution {
    NoData,
    Stats {
        min: f64,
        p25: f64,
        p50: f64,
        p75: f64,
        max: f64,
        count: usize,
    },
}

/// Summarize a sample using nearest-rank percentiles.
pub fn distribution(values: &[f64]) -> Distribution {
    if values.is_empty() {
        return Distribution::NoData;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Distribution::Stats {
        min: sorted[0],
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
        count: sorted.len(),
    }
}

/// `sorted` must be non-empty and ascending.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// A per-record measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMetric {
    LinesChanged,
    LeadTimeDays,
    TurnaroundHours,
    Comments,
    Approvals,
}

impl RecordMetric {
    pub const ALL: [RecordMetric; 5] = [
        RecordMetric::LinesChanged,
        RecordMetric::LeadTimeDays,
        RecordMetric::TurnaroundHours,
        RecordMetric::Comments,
        RecordMetric::Approvals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordMetric::LinesChanged => "lines",
            RecordMetric::LeadTimeDays => "lead-time",
            RecordMetric::TurnaroundHours => "turnaround",
            RecordMetric::Comments => "comments",
            RecordMetric::Approvals => "approvals",
        }
    }

    /// The record's value, or `None` when it has none or the repository
    /// opted out of the underlying signal.
    pub fn value(&self, record: &ContributionRecord, scope: &AggregateScope) -> Option<f64> {
        let opt_outs = scope.opt_outs_for(&record.repository);
        match self {
            RecordMetric::LinesChanged if opt_outs.lines => None,
            RecordMetric::LinesChanged => Some(record.lines_changed() as f64),
            RecordMetric::LeadTimeDays => record.lead_time_days(),
            RecordMetric::TurnaroundHours if opt_outs.comments => None,
            RecordMetric::TurnaroundHours => record.turnaround_hours(),
            RecordMetric::Comments if opt_outs.comments => None,
            RecordMetric::Comments => Some(record.comments.len() as f64),
            RecordMetric::Approvals if opt_outs.approvals => None,
            RecordMetric::Approvals => Some(record.approvals.len() as f64),
        }
    }
}

impl FromStr for RecordMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "lines" | "lines-changed" => Ok(RecordMetric::LinesChanged),
            "lead-time" | "lead-time-days" => Ok(RecordMetric::LeadTimeDays),
            "turnaround" | "turnaround-hours" => Ok(RecordMetric::TurnaroundHours),
            "comments" => Ok(RecordMetric::Comments),
            "approvals" => Ok(RecordMetric::Approvals),
            _ => Err(Error::Config(format!("unknown record metric: {s}"))),
        }
    }
}

impl fmt::Display for RecordMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values of `metric` for every record that has one, in input order.
pub fn record_samples(
    records: &[&ContributionRecord],
    metric: RecordMetric,
    scope: &AggregateScope,
) -> Vec<f64> {
    records.iter().filter_map(|r| metric.value(r, scope)).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedRecord<'a> {
    pub value: f64,
    pub record: &'a ContributionRecord,
}

/// Records with the highest values first, at most `limit` of them.
pub fn ranked_records<'a>(
    records: &[&'a ContributionRecord],
    metric: RecordMetric,
    scope: &AggregateScope,
    limit: usize,
) -> Vec<RankedRecord<'a>> {
    let mut ranked: Vec<RankedRecord<'a>> = records
        .iter()
        .filter_map(|&record| metric.value(record, scope).map(|value| RankedRecord { value, record }))
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(limit);
    ranked
}

/// The last `count` buckets of the gap-filled series.
pub fn recent_buckets(records: &[&ContributionRecord], granularity: Granularity, count: usize) -> Vec<Bucket> {
    let observed = bucket_records(records.iter().copied(), granularity);
    let mut series = fill_gaps(&observed, granularity, None);
    let skip = series.len().saturating_sub(count);
    series.drain(..skip);
    series
}

#[derive(Debug, Clone, Serialize)]
pub struct DrillDown<'a> {
    pub metric: RecordMetric,
    pub distribution: Distribution,
    pub groups: Vec<RepoGroup<'a>>,
    pub top: Vec<RankedRecord<'a>>,
}

pub const DEFAULT_TOP_RECORDS: usize = 10;

pub fn drill_down<'a>(
    records: &[&'a ContributionRecord],
    metric: RecordMetric,
    scope: &AggregateScope,
    config: &Config,
) -> DrillDown<'a> {
    DrillDown {
        metric,
        distribution: distribution(&record_samples(records, metric, scope)),
        groups: group_by_repo(records, scope, config),
        top: ranked_records(records, metric, scope, DEFAULT_TOP_RECORDS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::BucketKey;
    use crate::snapshot::test_support::record;
    use crate::snapshot::ScoringOptOuts;

    #[test]
    fn test_distribution_empty() {
        assert_eq!(distribution(&[]), Distribution::NoData);
    }

    #[test]
    fn test_distribution_single() {
        assert_eq!(
            distribution(&[7.0]),
            Distribution::Stats {
                min: 7.0,
                p25: 7.0,
                p50: 7.0,
                p75: 7.0,
                max: 7.0,
                count: 1
            }
        );
    }

    #[test]
    fn test_distribution_nearest_rank() {
        let values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        let Distribution::Stats {
            min,
            p25,
            p50,
            p75,
            max,
            count,
        } = distribution(&values)
        else {
            panic!("expected stats");
        };
        assert_eq!((min, max, count), (1.0, 10.0, 10));
        // floor(0.25 * 10) = 2, floor(0.5 * 10) = 5, floor(0.75 * 10) = 7
        assert_eq!((p25, p50, p75), (3.0, 6.0, 8.0));
    }

    #[test]
    fn test_group_by_repo_orders_by_size_then_appearance() {
        let records = vec![
            record("a", "g/one", "2025-01-01T00:00:00Z"),
            record("a", "g/two", "2025-01-01T00:00:00Z"),
            record("a", "g/three", "2025-01-01T00:00:00Z"),
            record("b", "g/three", "2025-01-02T00:00:00Z").merged("2025-01-03T00:00:00Z"),
        ];
        let refs: Vec<&_> = records.iter().collect();
        let groups = group_by_repo(&refs, &AggregateScope::new(), &Config::default());

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, ["three", "one", "two"]);
        assert_eq!(groups[0].records.len(), 2);
        assert_eq!(groups[0].aggregate.throughput, 1);
        assert_eq!(groups[0].aggregate.active_contributors, 2);
    }

    #[test]
    fn test_ranked_records_omits_missing_values() {
        let merged_fast = record("a", "g/r", "2025-01-01T00:00:00Z")
            .merged("2025-01-02T00:00:00Z")
            .iid(1);
        let merged_slow = record("a", "g/r", "2025-01-01T00:00:00Z")
            .merged("2025-01-11T00:00:00Z")
            .iid(2);
        let open = record("a", "g/r", "2025-01-01T00:00:00Z").iid(3);
        let refs = vec![&merged_fast, &open, &merged_slow];

        let ranked = ranked_records(&refs, RecordMetric::LeadTimeDays, &AggregateScope::new(), 10);
        let iids: Vec<u64> = ranked.iter().map(|r| r.record.iid).collect();
        assert_eq!(iids, [2, 1]);
        assert_eq!(ranked[0].value, 10.0);

        let ranked = ranked_records(&refs, RecordMetric::LeadTimeDays, &AggregateScope::new(), 1);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_samples_respect_opt_outs() {
        let r = record("a", "g/r", "2025-01-01T00:00:00Z")
            .lines(4, 6)
            .comment("b", None);
        let scope = AggregateScope::new().with_opt_outs(
            "g/r",
            ScoringOptOuts {
                lines: true,
                comments: false,
                approvals: false,
            },
        );
        assert!(record_samples(&[&r], RecordMetric::LinesChanged, &scope).is_empty());
        assert_eq!(
            record_samples(&[&r], RecordMetric::LinesChanged, &AggregateScope::new()),
            [10.0]
        );
        assert_eq!(record_samples(&[&r], RecordMetric::Comments, &scope), [1.0]);
    }

    #[test]
    fn test_recent_buckets_takes_tail_of_filled_series() {
        let a = record("a", "g/r", "2025-01-15T00:00:00Z");
        let b = record("a", "g/r", "2025-05-02T00:00:00Z");
        let buckets = recent_buckets(&[&a, &b], Granularity::Month, 3);
        let keys: Vec<BucketKey> = buckets.iter().map(|b| b.key).collect();
        assert_eq!(
            keys,
            [
                BucketKey::Month(2025, 3),
                BucketKey::Month(2025, 4),
                BucketKey::Month(2025, 5)
            ]
        );
        assert_eq!(buckets[2].counts.total(), 1);
        assert_eq!(buckets[0].counts.total(), 0);

        assert_eq!(recent_buckets(&[&a, &b], Granularity::Month, 50).len(), 5);
        assert!(recent_buckets(&[], Granularity::Day, 3).is_empty());
    }

    #[test]
    fn test_drill_down_composes() {
        let a = record("a", "g/r", "2025-01-01T00:00:00Z").lines(1, 1);
        let b = record("a", "g/s", "2025-01-01T00:00:00Z").lines(5, 5);
        let dd = drill_down(&[&a, &b], RecordMetric::LinesChanged, &AggregateScope::new(), &Config::default());
        assert_eq!(dd.groups.len(), 2);
        assert_eq!(dd.top[0].value, 10.0);
        assert!(matches!(dd.distribution, Distribution::Stats { count: 2, .. }));
    }

    #[test]
    fn test_record_metric_from_str() {
        assert_eq!("lead_time".parse::<RecordMetric>().unwrap(), RecordMetric::LeadTimeDays);
        assert!("velocity".parse::<RecordMetric>().is_err());
    }
}
