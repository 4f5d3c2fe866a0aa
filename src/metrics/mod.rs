pub mod trend;
pub mod types;

use log::debug;

use crate::aggregate::{aggregate, AggregateScope, ContributorAggregate};
use crate::config::Config;
use crate::query::Period;
use crate::snapshot::ContributionRecord;

pub use trend::{trend, Direction, TrendChange, TrendIndicator, Verdict};
pub use types::{MetricTrend, PeriodAggregate, Polarity, TeamAggregate, TeamMetric, TeamReport};

/// Compute team indicators over `records`.
///
/// `contributors` are the aggregates already materialized for the same
/// scope; they drive the active count and AI breadth.
pub fn team_aggregate(
    records: &[&ContributionRecord],
    contributors: &[ContributorAggregate<'_>],
    scope: &AggregateScope,
    config: &Config,
) -> TeamAggregate {
    let merged: Vec<&ContributionRecord> = records.iter().copied().filter(|r| r.is_merged()).collect();

    let lead_times: Vec<f64> = merged.iter().filter_map(|r| r.lead_time_days()).collect();

    let turnarounds: Vec<f64> = records
        .iter()
        .filter(|r| !scope.opt_outs_for(&r.repository).comments)
        .filter_map(|r| r.turnaround_hours())
        .collect();

    let approved = merged
        .iter()
        .filter(|r| !scope.opt_outs_for(&r.repository).approvals && !r.approvals.is_empty())
        .count();

    let ai_flagged = records.iter().filter(|r| r.ai_coauthored).count();

    let author_ratios: Vec<f64> = contributors.iter().filter_map(|c| c.ai_ratio()).collect();
    let broad = author_ratios
        .iter()
        .filter(|&&ratio| ratio >= config.ai_threshold)
        .count();

    let lines_changed = records
        .iter()
        .map(|r| {
            let (a, d) = scope.effective_lines(r);
            a + d
        })
        .sum();

    TeamAggregate {
        record_count: records.len() as u64,
        throughput: merged.len() as u64,
        median_lead_time_days: median(&lead_times),
        median_turnaround_hours: median(&turnarounds),
        ai_rate: ratio(ai_flagged, records.len()),
        ai_breadth: ratio(broad, author_ratios.len()),
        review_coverage: ratio(approved, merged.len()),
        active_contributors: contributors.len() as u64,
        lines_changed,
    }
}

/// Median of the values; 0 when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Aggregate one period: records are selected by creation date, events by
/// their own dates across all `records`.
pub fn period_aggregate(
    records: &[&ContributionRecord],
    period: &Period,
    scope: &AggregateScope,
    config: &Config,
) -> PeriodAggregate {
    let scope = scope.clone().with_period(period);
    let selected = period.select(records);
    let contributors = aggregate(records, &scope);
    debug!(
        "Period {}: {} records, {} contributors",
        period.to_key(),
        selected.len(),
        contributors.len()
    );

    PeriodAggregate {
        period_key: period.to_key(),
        label: period.label(),
        aggregate: team_aggregate(&selected, &contributors, &scope, config),
    }
}

/// Aggregate `period` and, unless it is custom, the period before it with
/// a trend per indicator.
pub fn team_report(
    records: &[&ContributionRecord],
    period: &Period,
    scope: &AggregateScope,
    config: &Config,
) -> TeamReport {
    let current = period_aggregate(records, period, scope, config);
    let previous = period
        .previous()
        .map(|prev| period_aggregate(records, &prev, scope, config));

    let trends = match &previous {
        Some(prev) => TeamMetric::ALL
            .iter()
            .map(|m| {
                let now = m.value(&current.aggregate);
                let before = m.value(&prev.aggregate);
                MetricTrend {
                    metric: *m,
                    current: now,
                    previous: before,
                    trend: trend(before, now, m.polarity()),
                }
            })
            .collect(),
        None => Vec::new(),
    };

    TeamReport {
        current,
        previous,
        trends,
    }
}
