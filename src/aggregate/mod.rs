use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::date_util::utc_date;
use crate::query::Period;
use crate::snapshot::{
    ApprovalEvent, CommentEvent, ContributionRecord, Identity, RecordState, ScoringOptOuts, Snapshot,
};

/// What counts toward an aggregate: per-repository opt-outs and an optional
/// inclusive date range for authorship, comment and approval events.
///
/// The same scope drives both the contributor and the team computations so
/// opt-outs are applied identically everywhere.
#[derive(Debug, Clone, Default)]
pub struct AggregateScope {
    opt_outs: HashMap<String, ScoringOptOuts>,
    range: Option<(NaiveDate, NaiveDate)>,
}

impl AggregateScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opt-outs from each repository's `skip_scoring` list.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let opt_outs = snapshot
            .repositories()
            .iter()
            .filter(|r| !r.opt_outs.is_empty())
            .map(|r| (r.full_path.clone(), r.opt_outs))
            .collect();
        Self {
            opt_outs,
            range: None,
        }
    }

    pub fn with_opt_outs(mut self, repository: &str, opt_outs: ScoringOptOuts) -> Self {
        self.opt_outs.insert(repository.to_string(), opt_outs);
        self
    }

    /// Only count events dated within `[start, end]` (UTC dates).
    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn with_period(self, period: &Period) -> Self {
        let (start, end) = period.date_range();
        self.with_range(start, end)
    }

    pub fn without_range(mut self) -> Self {
        self.range = None;
        self
    }

    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.range
    }

    pub fn opt_outs_for(&self, repository: &str) -> ScoringOptOuts {
        self.opt_outs.get(repository).copied().unwrap_or_default()
    }

    pub fn in_range(&self, ts: DateTime<Utc>) -> bool {
        match self.range {
            Some((start, end)) => {
                let d = utc_date(ts);
                d >= start && d <= end
            }
            None => true,
        }
    }

    /// Whether the record's authorship falls in scope.
    pub fn counts_authorship(&self, record: &ContributionRecord) -> bool {
        self.in_range(record.created_at)
    }

    /// Additions and deletions after line opt-outs.
    pub fn effective_lines(&self, record: &ContributionRecord) -> (u64, u64) {
        if self.opt_outs_for(&record.repository).lines {
            (0, 0)
        } else {
            (record.additions, record.deletions)
        }
    }

    pub fn counts_comment(&self, record: &ContributionRecord, comment: &CommentEvent) -> bool {
        !self.opt_outs_for(&record.repository).comments && self.in_range(record.comment_time(comment))
    }

    pub fn counts_approval(&self, record: &ContributionRecord, approval: &ApprovalEvent) -> bool {
        !self.opt_outs_for(&record.repository).approvals
            && self.in_range(record.approval_time(approval))
    }
}

/// An authored record with its line deltas after opt-outs.
#[derive(Debug, Clone, Copy)]
pub struct AuthoredRecord<'a> {
    pub record: &'a ContributionRecord,
    pub additions: u64,
    pub deletions: u64,
}

/// Everything one person contributed within a scope.
#[derive(Debug, Clone)]
pub struct ContributorAggregate<'a> {
    pub identity: Identity,
    pub authored: Vec<AuthoredRecord<'a>>,
    /// All counted comments, including those on own records.
    pub comments: u64,
    pub comments_on_own: u64,
    pub approvals: u64,
}

impl<'a> ContributorAggregate<'a> {
    fn new(identity: Identity) -> Self {
        Self {
            identity,
            authored: Vec::new(),
            comments: 0,
            comments_on_own: 0,
            approvals: 0,
        }
    }

    pub fn handle(&self) -> &str {
        &self.identity.handle
    }

    pub fn authored_count(&self) -> u64 {
        self.authored.len() as u64
    }

    pub fn merged_count(&self) -> u64 {
        self.authored.iter().filter(|a| a.record.is_merged()).count() as u64
    }

    /// Authored records that are not merged (open or closed).
    pub fn non_merged_count(&self) -> u64 {
        self.authored_count() - self.merged_count()
    }

    pub fn open_count(&self) -> u64 {
        self.count_state(RecordState::Open)
    }

    pub fn closed_count(&self) -> u64 {
        self.count_state(RecordState::Closed)
    }

    fn count_state(&self, state: RecordState) -> u64 {
        self.authored.iter().filter(|a| a.record.state == state).count() as u64
    }

    pub fn additions(&self) -> u64 {
        self.authored.iter().map(|a| a.additions).sum()
    }

    pub fn deletions(&self) -> u64 {
        self.authored.iter().map(|a| a.deletions).sum()
    }

    /// Share of authored records flagged AI-co-authored; `None` without
    /// authored records.
    pub fn ai_ratio(&self) -> Option<f64> {
        if self.authored.is_empty() {
            return None;
        }
        let flagged = self.authored.iter().filter(|a| a.record.ai_coauthored).count();
        Some(flagged as f64 / self.authored.len() as f64)
    }
}

/// Fold records into one aggregate per person, ordered by handle.
///
/// Only people with at least one counted authored record, comment or
/// approval appear in the result.
pub fn aggregate<'a>(
    records: &[&'a ContributionRecord],
    scope: &AggregateScope,
) -> Vec<ContributorAggregate<'a>> {
    let mut by_handle: BTreeMap<String, ContributorAggregate<'a>> = BTreeMap::new();

    for &record in records {
        if scope.counts_authorship(record) {
            let (additions, deletions) = scope.effective_lines(record);
            ensure(&mut by_handle, &record.author).authored.push(AuthoredRecord {
                record,
                additions,
                deletions,
            });
        }

        for comment in &record.comments {
            if !scope.counts_comment(record, comment) {
                continue;
            }
            let agg = ensure(&mut by_handle, &comment.author);
            agg.comments += 1;
            if record.is_own(&comment.author.handle) {
                agg.comments_on_own += 1;
            }
        }

        for approval in &record.approvals {
            if scope.counts_approval(record, approval) {
                ensure(&mut by_handle, &approval.approver).approvals += 1;
            }
        }
    }

    by_handle.into_values().collect()
}

fn ensure<'m, 'a>(
    map: &'m mut BTreeMap<String, ContributorAggregate<'a>>,
    identity: &Identity,
) -> &'m mut ContributorAggregate<'a> {
    let agg = map
        .entry(identity.handle.clone())
        .or_insert_with(|| ContributorAggregate::new(identity.clone()));
    if agg.identity.avatar_url.is_none() && identity.avatar_url.is_some() {
        agg.identity.avatar_url = identity.avatar_url.clone();
    }
    if agg.identity.name == agg.identity.handle && identity.name != identity.handle {
        agg.identity.name = identity.name.clone();
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::{record, repo};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_aggregate_counts_authored_comments_and_approvals() {
        let r1 = record("alice", "g/a", "2025-01-01T00:00:00Z")
            .merged("2025-01-02T00:00:00Z")
            .lines(100, 20)
            .comment("bob", Some("2025-01-01T05:00:00Z"))
            .comment("alice", Some("2025-01-01T06:00:00Z"))
            .approval("bob", None);
        let r2 = record("bob", "g/a", "2025-01-03T00:00:00Z").comment("bob", None);
        let records = vec![&r1, &r2];

        let aggs = aggregate(&records, &AggregateScope::new());
        assert_eq!(aggs.len(), 2);

        let alice = &aggs[0];
        assert_eq!(alice.handle(), "alice");
        assert_eq!(alice.authored_count(), 1);
        assert_eq!(alice.merged_count(), 1);
        assert_eq!(alice.additions(), 100);
        assert_eq!(alice.deletions(), 20);
        assert_eq!(alice.comments, 1);
        assert_eq!(alice.comments_on_own, 1);
        assert_eq!(alice.approvals, 0);

        let bob = &aggs[1];
        assert_eq!(bob.authored_count(), 1);
        assert_eq!(bob.open_count(), 1);
        assert_eq!(bob.comments, 2);
        assert_eq!(bob.comments_on_own, 1);
        assert_eq!(bob.approvals, 1);
    }

    #[test]
    fn test_skip_lines_zeroes_deltas() {
        let skipped = record("alice", "g/skip", "2025-01-01T00:00:00Z").lines(500, 300);
        let kept = record("alice", "g/keep", "2025-01-02T00:00:00Z").lines(10, 5);
        let snapshot = Snapshot::from_parts(
            vec![repo("g/skip", &["lines"]), repo("g/keep", &[])],
            vec![],
        );
        let scope = AggregateScope::from_snapshot(&snapshot);

        let aggs = aggregate(&[&skipped], &scope);
        assert_eq!(aggs[0].additions(), 0);
        assert_eq!(aggs[0].deletions(), 0);
        assert_eq!(aggs[0].authored_count(), 1, "record still counts as authored");

        let aggs = aggregate(&[&skipped, &kept], &scope);
        assert_eq!(aggs[0].additions(), 10);
        assert_eq!(aggs[0].deletions(), 5);
    }

    #[test]
    fn test_skip_comments_and_approvals() {
        let r = record("alice", "g/r", "2025-01-01T00:00:00Z")
            .comment("bob", None)
            .approval("carol", None);
        let scope = AggregateScope::new().with_opt_outs(
            "g/r",
            ScoringOptOuts {
                lines: false,
                comments: true,
                approvals: true,
            },
        );
        let aggs = aggregate(&[&r], &scope);
        assert_eq!(aggs.len(), 1, "bob and carol have no counted contribution");
        assert_eq!(aggs[0].handle(), "alice");
    }

    #[test]
    fn test_range_restricts_events_not_just_records() {
        // Record created before the range, but reviewed inside it.
        let r = record("alice", "g/r", "2024-12-20T00:00:00Z")
            .comment("bob", Some("2025-01-02T00:00:00Z"))
            .comment("carol", Some("2024-12-21T00:00:00Z"))
            .approval("dave", Some("2025-01-03T00:00:00Z"));
        let scope = AggregateScope::new().with_range(d(2025, 1, 1), d(2025, 1, 31));
        let aggs = aggregate(&[&r], &scope);
        let handles: Vec<&str> = aggs.iter().map(|a| a.handle()).collect();
        assert_eq!(handles, ["bob", "dave"]);
    }

    #[test]
    fn test_ai_ratio() {
        let a = record("alice", "g/r", "2025-01-01T00:00:00Z").ai();
        let b = record("alice", "g/r", "2025-01-02T00:00:00Z");
        let c = record("bob", "g/r", "2025-01-02T00:00:00Z").comment("carol", None);
        let aggs = aggregate(&[&a, &b, &c], &AggregateScope::new());
        assert_eq!(aggs[0].ai_ratio(), Some(0.5));
        assert_eq!(aggs[1].ai_ratio(), Some(0.0));
        assert_eq!(aggs[2].ai_ratio(), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[], &AggregateScope::new()).is_empty());
    }
}
