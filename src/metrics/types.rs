use serde::Serialize;

use super::trend::TrendIndicator;

/// Team-wide indicators for one period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamAggregate {
    /// Records created in the period.
    pub record_count: u64,
    /// Merged records.
    pub throughput: u64,
    /// Median days from creation to merge; 0 without merged records.
    pub median_lead_time_days: f64,
    /// Median hours from creation to the first reviewer comment.
    pub median_turnaround_hours: f64,
    /// Fraction of records flagged AI-co-authored.
    pub ai_rate: f64,
    /// Fraction of authors whose own AI ratio meets the threshold.
    pub ai_breadth: f64,
    /// Fraction of merged records with at least one approval.
    pub review_coverage: f64,
    pub active_contributors: u64,
    /// Additions plus deletions, after line opt-outs.
    pub lines_changed: u64,
}

/// Direction of a metric that counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// The scalar indicators a `TeamAggregate` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamMetric {
    Throughput,
    LeadTime,
    Turnaround,
    AiRate,
    AiBreadth,
    ReviewCoverage,
    ActiveContributors,
    LinesChanged,
}

impl TeamMetric {
    pub const ALL: [TeamMetric; 8] = [
        TeamMetric::Throughput,
        TeamMetric::LeadTime,
        TeamMetric::Turnaround,
        TeamMetric::AiRate,
        TeamMetric::AiBreadth,
        TeamMetric::ReviewCoverage,
        TeamMetric::ActiveContributors,
        TeamMetric::LinesChanged,
    ];

    pub fn polarity(&self) -> Polarity {
        match self {
            TeamMetric::LeadTime | TeamMetric::Turnaround => Polarity::LowerIsBetter,
            _ => Polarity::HigherIsBetter,
        }
    }

    pub fn value(&self, agg: &TeamAggregate) -> f64 {
        match self {
            TeamMetric::Throughput => agg.throughput as f64,
            TeamMetric::LeadTime => agg.median_lead_time_days,
            TeamMetric::Turnaround => agg.median_turnaround_hours,
            TeamMetric::AiRate => agg.ai_rate,
            TeamMetric::AiBreadth => agg.ai_breadth,
            TeamMetric::ReviewCoverage => agg.review_coverage,
            TeamMetric::ActiveContributors => agg.active_contributors as f64,
            TeamMetric::LinesChanged => agg.lines_changed as f64,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TeamMetric::Throughput => "Throughput",
            TeamMetric::LeadTime => "Median lead time (days)",
            TeamMetric::Turnaround => "Median turnaround (hours)",
            TeamMetric::AiRate => "AI rate",
            TeamMetric::AiBreadth => "AI breadth",
            TeamMetric::ReviewCoverage => "Review coverage",
            TeamMetric::ActiveContributors => "Active contributors",
            TeamMetric::LinesChanged => "Lines changed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodAggregate {
    pub period_key: String,
    pub label: String,
    pub aggregate: TeamAggregate,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricTrend {
    pub metric: TeamMetric,
    pub current: f64,
    pub previous: f64,
    pub trend: TrendIndicator,
}

/// Current period aggregate plus the comparison with the period before it.
/// Custom periods have no previous aggregate and no trends.
#[derive(Debug, Clone, Serialize)]
pub struct TeamReport {
    pub current: PeriodAggregate,
    pub previous: Option<PeriodAggregate>,
    pub trends: Vec<MetricTrend>,
}
