use std::collections::HashSet;

use chrono::NaiveDate;

use crate::date_util::utc_date;
use crate::snapshot::{ContributionRecord, RecordState, Snapshot};

/// Builder for the record selection applied before any aggregation.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    repository: Option<String>,
    team: Option<String>,
    author: Option<String>,
    state: Option<RecordState>,
    created_after: Option<NaiveDate>,
    created_before: Option<NaiveDate>,
    ai_coauthored: Option<bool>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one repository, by `full_path` or short name.
    pub fn repository(mut self, repo: &str) -> Self {
        self.repository = Some(repo.to_string());
        self
    }

    /// Restrict to repositories tagged with this team.
    pub fn team(mut self, team: &str) -> Self {
        self.team = Some(team.to_string());
        self
    }

    pub fn author(mut self, handle: &str) -> Self {
        self.author = Some(handle.to_string());
        self
    }

    pub fn state(mut self, state: RecordState) -> Self {
        self.state = Some(state);
        self
    }

    /// Created on or after this date (UTC).
    pub fn created_after(mut self, date: NaiveDate) -> Self {
        self.created_after = Some(date);
        self
    }

    /// Created on or before this date (UTC).
    pub fn created_before(mut self, date: NaiveDate) -> Self {
        self.created_before = Some(date);
        self
    }

    pub fn ai_coauthored(mut self, val: bool) -> Self {
        self.ai_coauthored = Some(val);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.repository.is_none()
            && self.team.is_none()
            && self.author.is_none()
            && self.state.is_none()
            && self.created_after.is_none()
            && self.created_before.is_none()
            && self.ai_coauthored.is_none()
    }

    /// Select matching records, in snapshot order.
    pub fn apply<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a ContributionRecord> {
        let repos: Option<HashSet<&str>> = if self.repository.is_some() || self.team.is_some() {
            Some(
                snapshot
                    .repositories()
                    .iter()
                    .filter(|r| {
                        self.repository
                            .as_deref()
                            .is_none_or(|want| r.full_path == want || r.name == want)
                    })
                    .filter(|r| self.team.as_deref().is_none_or(|team| r.in_team(team)))
                    .map(|r| r.full_path.as_str())
                    .collect(),
            )
        } else {
            None
        };

        snapshot
            .records()
            .iter()
            .filter(|r| {
                repos
                    .as_ref()
                    .is_none_or(|set| set.contains(r.repository.as_str()))
            })
            .filter(|r| self.matches_record(r))
            .collect()
    }

    fn matches_record(&self, r: &ContributionRecord) -> bool {
        let created = utc_date(r.created_at);
        self.author.as_deref().is_none_or(|a| r.author.handle == a)
            && self.state.is_none_or(|s| r.state == s)
            && self.created_after.is_none_or(|d| created >= d)
            && self.created_before.is_none_or(|d| created <= d)
            && self.ai_coauthored.is_none_or(|ai| r.ai_coauthored == ai)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::test_support::{record, repo};

    fn snapshot() -> Snapshot {
        let mut platform = repo("org/kernel", &[]);
        platform.teams = vec!["Platform".into()];
        let tools = repo("org/tools", &[]);
        Snapshot::from_parts(
            vec![platform, tools],
            vec![
                record("alice", "org/kernel", "2025-01-01T00:00:00Z").merged("2025-01-02T00:00:00Z"),
                record("bob", "org/tools", "2025-01-05T00:00:00Z").ai(),
                record("alice", "org/tools", "2025-02-01T00:00:00Z").closed(),
            ],
        )
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let snap = snapshot();
        let f = RecordFilter::new();
        assert!(f.is_empty());
        assert_eq!(f.apply(&snap).len(), 3);
    }

    #[test]
    fn test_repository_by_path_or_name() {
        let snap = snapshot();
        assert_eq!(RecordFilter::new().repository("org/tools").apply(&snap).len(), 2);
        assert_eq!(RecordFilter::new().repository("kernel").apply(&snap).len(), 1);
        assert!(RecordFilter::new().repository("nope").apply(&snap).is_empty());
    }

    #[test]
    fn test_team_is_case_insensitive() {
        let snap = snapshot();
        let hits = RecordFilter::new().team("platform").apply(&snap);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].repository, "org/kernel");
    }

    #[test]
    fn test_combined_filters() {
        let snap = snapshot();
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();
        let hits = RecordFilter::new()
            .author("alice")
            .created_after(d(1, 1))
            .created_before(d(1, 31))
            .apply(&snap);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].state, RecordState::Merged);

        assert_eq!(RecordFilter::new().state(RecordState::Closed).apply(&snap).len(), 1);
        assert_eq!(RecordFilter::new().ai_coauthored(true).apply(&snap).len(), 1);
    }
}
