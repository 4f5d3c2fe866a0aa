pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod date_util;
pub mod drilldown;
pub mod error;
pub mod metrics;
pub mod query;
pub mod scoring;
pub mod snapshot;
pub mod url;

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

pub use aggregate::{AggregateScope, ContributorAggregate};
pub use calendar::{Bucket, BucketKey, Granularity};
pub use config::{Config, ConfigLayer, Weights};
pub use drilldown::{DrillDown, Distribution, RecordMetric};
pub use error::{Error, Result};
pub use metrics::{TeamAggregate, TeamMetric, TeamReport, TrendIndicator};
pub use query::{Period, RecordFilter};
pub use scoring::{ContributorMetric, LeaderboardEntry, ScoreBreakdown};
pub use snapshot::{ContributionRecord, Identity, Snapshot};

use date_util::utc_date;

/// A gap-free series of record counts.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub granularity: Granularity,
    pub buckets: Vec<Bucket>,
}

/// Main entry point: a loaded snapshot plus the active configuration.
///
/// Every query recomputes from the snapshot; nothing is cached between
/// calls, so a new configuration applies to the next call.
pub struct Dashboard {
    snapshot: Snapshot,
    config: Config,
}

impl Dashboard {
    pub fn new(snapshot: Snapshot, config: Config) -> Self {
        Self { snapshot, config }
    }

    pub async fn open_at(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let snapshot = Snapshot::open_at(path).await?;
        Ok(Self::new(snapshot, config))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    // ── Selection ──────────────────────────────────────────────────

    /// Opt-outs from the snapshot, with events limited to `period` if given.
    pub fn scope(&self, period: Option<&Period>) -> AggregateScope {
        let scope = AggregateScope::from_snapshot(&self.snapshot);
        match period {
            Some(p) => scope.with_period(p),
            None => scope,
        }
    }

    pub fn records(&self, filter: &RecordFilter) -> Vec<&ContributionRecord> {
        filter.apply(&self.snapshot)
    }

    // ── Contributors ───────────────────────────────────────────────

    pub fn contributors(&self, filter: &RecordFilter, period: Option<&Period>) -> Vec<ContributorAggregate<'_>> {
        let records = self.records(filter);
        aggregate::aggregate(&records, &self.scope(period))
    }

    pub fn leaderboard(
        &self,
        filter: &RecordFilter,
        period: Option<&Period>,
        metric: ContributorMetric,
    ) -> Vec<LeaderboardEntry> {
        let aggs = self.contributors(filter, period);
        scoring::leaderboard(&aggs, metric, &self.config.weights)
    }

    // ── Team ───────────────────────────────────────────────────────

    pub fn team_report(&self, filter: &RecordFilter, period: &Period) -> TeamReport {
        let records = self.records(filter);
        metrics::team_report(&records, period, &self.scope(None), &self.config)
    }

    /// Bucketed record counts. Without a granularity one is picked from the
    /// span of the range, or of the records' creation dates.
    pub fn timeline(
        &self,
        filter: &RecordFilter,
        granularity: Option<Granularity>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Timeline {
        let records = self.records(filter);
        let granularity = granularity.unwrap_or_else(|| {
            let span = range.or_else(|| {
                let dates = records.iter().map(|r| utc_date(r.created_at));
                Some((dates.clone().min()?, dates.max()?))
            });
            span.map_or(Granularity::Day, |(start, end)| Granularity::for_range(start, end))
        });

        let observed = calendar::bucket_records(records.iter().copied(), granularity);
        Timeline {
            granularity,
            buckets: calendar::fill_gaps(&observed, granularity, range),
        }
    }

    // ── Drill-down ─────────────────────────────────────────────────

    pub fn drill_down(&self, filter: &RecordFilter, period: Option<&Period>, metric: RecordMetric) -> DrillDown<'_> {
        let records = self.records(filter);
        let records = match period {
            Some(p) => p.select(&records),
            None => records,
        };
        drilldown::drill_down(&records, metric, &self.scope(period), &self.config)
    }
}
