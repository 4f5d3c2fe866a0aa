use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::aggregate::ContributorAggregate;
use crate::config::Weights;
use crate::error::{Error, Result};
use crate::snapshot::Identity;

/// Weighted parts of a composite score, unrounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub open: f64,
    pub merged: f64,
    pub comments: f64,
    pub approvals: f64,
    pub additions: f64,
    pub deletions: f64,
    pub priority: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.open
            + self.merged
            + self.comments
            + self.approvals
            + self.additions
            + self.deletions
            + self.priority
    }

    /// Total rounded to the nearest integer, as displayed.
    pub fn rounded(&self) -> i64 {
        self.total().round() as i64
    }
}

/// Compute the composite score of one contributor.
///
/// Records without a priority label add no priority points at all; labels
/// that do not match a known tier use the `undefined` weight.
pub fn score(agg: &ContributorAggregate<'_>, weights: &Weights) -> ScoreBreakdown {
    let priority = agg
        .authored
        .iter()
        .filter_map(|a| a.record.priority)
        .map(|p| weights.priority.get(p))
        .sum();

    ScoreBreakdown {
        open: agg.non_merged_count() as f64 * weights.open,
        merged: agg.merged_count() as f64 * weights.merged,
        comments: agg.comments as f64 * weights.comment,
        approvals: agg.approvals as f64 * weights.approval,
        additions: agg.additions() as f64 * weights.line_added,
        deletions: agg.deletions() as f64 * weights.line_deleted,
        priority,
    }
}

/// A ranking dimension for contributors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributorMetric {
    Score,
    Authored,
    Merged,
    Open,
    Closed,
    Additions,
    Deletions,
    LinesChanged,
    Comments,
    CommentsOnOwn,
    Approvals,
}

impl ContributorMetric {
    pub const ALL: [ContributorMetric; 11] = [
        ContributorMetric::Score,
        ContributorMetric::Authored,
        ContributorMetric::Merged,
        ContributorMetric::Open,
        ContributorMetric::Closed,
        ContributorMetric::Additions,
        ContributorMetric::Deletions,
        ContributorMetric::LinesChanged,
        ContributorMetric::Comments,
        ContributorMetric::CommentsOnOwn,
        ContributorMetric::Approvals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContributorMetric::Score => "score",
            ContributorMetric::Authored => "authored",
            ContributorMetric::Merged => "merged",
            ContributorMetric::Open => "open",
            ContributorMetric::Closed => "closed",
            ContributorMetric::Additions => "additions",
            ContributorMetric::Deletions => "deletions",
            ContributorMetric::LinesChanged => "lines_changed",
            ContributorMetric::Comments => "comments",
            ContributorMetric::CommentsOnOwn => "comments_on_own",
            ContributorMetric::Approvals => "approvals",
        }
    }
}

impl FromStr for ContributorMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        ContributorMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| Error::Config(format!("unknown contributor metric: {s}")))
    }
}

impl fmt::Display for ContributorMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of one metric for a contributor. Everything except `Score` is an
/// exact count; `Score` is the rounded composite.
pub fn metric_value(agg: &ContributorAggregate<'_>, metric: ContributorMetric, weights: &Weights) -> f64 {
    let n = match metric {
        ContributorMetric::Score => return score(agg, weights).rounded() as f64,
        ContributorMetric::Authored => agg.authored_count(),
        ContributorMetric::Merged => agg.merged_count(),
        ContributorMetric::Open => agg.open_count(),
        ContributorMetric::Closed => agg.closed_count(),
        ContributorMetric::Additions => agg.additions(),
        ContributorMetric::Deletions => agg.deletions(),
        ContributorMetric::LinesChanged => agg.additions() + agg.deletions(),
        ContributorMetric::Comments => agg.comments,
        ContributorMetric::CommentsOnOwn => agg.comments_on_own,
        ContributorMetric::Approvals => agg.approvals,
    };
    n as f64
}

/// All single-dimension metrics of one contributor plus the score.
#[derive(Debug, Clone, Serialize)]
pub struct ContributorSummary {
    pub identity: Identity,
    pub score: i64,
    pub breakdown: ScoreBreakdown,
    pub authored: u64,
    pub merged: u64,
    pub open: u64,
    pub closed: u64,
    pub additions: u64,
    pub deletions: u64,
    pub comments: u64,
    pub comments_on_own: u64,
    pub approvals: u64,
    /// Share of authored records that were merged, in percent.
    pub merge_rate_pct: Option<f64>,
}

pub fn summarize(agg: &ContributorAggregate<'_>, weights: &Weights) -> ContributorSummary {
    let breakdown = score(agg, weights);
    let authored = agg.authored_count();
    let merged = agg.merged_count();
    ContributorSummary {
        identity: agg.identity.clone(),
        score: breakdown.rounded(),
        breakdown,
        authored,
        merged,
        open: agg.open_count(),
        closed: agg.closed_count(),
        additions: agg.additions(),
        deletions: agg.deletions(),
        comments: agg.comments,
        comments_on_own: agg.comments_on_own,
        approvals: agg.approvals,
        merge_rate_pct: (authored > 0).then(|| merged as f64 / authored as f64 * 100.0),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based; equal values share a rank.
    pub rank: usize,
    pub value: f64,
    #[serde(flatten)]
    pub summary: ContributorSummary,
}

/// Rank contributors by a metric, highest first. Ties are ordered by handle
/// and share the same rank.
pub fn leaderboard(
    aggs: &[ContributorAggregate<'_>],
    metric: ContributorMetric,
    weights: &Weights,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(f64, &ContributorAggregate<'_>)> = aggs
        .iter()
        .map(|a| (metric_value(a, metric, weights), a))
        .collect();
    rows.sort_by(|(va, a), (vb, b)| match vb.total_cmp(va) {
        Ordering::Equal => a.handle().cmp(b.handle()),
        other => other,
    });

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
    for (i, (value, agg)) in rows.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.value == value => prev.rank,
            _ => i + 1,
        };
        entries.push(LeaderboardEntry {
            rank,
            value,
            summary: summarize(agg, weights),
        });
    }
    entries
}
