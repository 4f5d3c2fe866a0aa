use chrono::{DateTime, Utc};
use serde::Serialize;

/// A person: the handle is the aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub handle: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Build an identity, falling back to the handle for a missing name.
    pub fn new(handle: Option<&str>, name: Option<&str>, avatar_url: Option<&str>) -> Self {
        let handle = handle
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or("unknown")
            .to_string();
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&handle)
            .to_string();
        let avatar_url = avatar_url
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        Self {
            handle,
            name,
            avatar_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Open,
    Merged,
    Closed,
}

impl RecordState {
    /// Map a GitLab state string. Unknown states count as open.
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "merged" => RecordState::Merged,
            "closed" | "locked" => RecordState::Closed,
            "opened" | "open" => RecordState::Open,
            other => {
                log::debug!("Unknown merge request state '{other}', treating as open");
                RecordState::Open
            }
        }
    }
}

/// Normalized issue priority tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Major,
    Normal,
    Minor,
    Undefined,
}

impl Priority {
    pub fn from_label(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "blocker" | "critical" | "urgent" => Priority::Critical,
            "major" | "high" => Priority::Major,
            "normal" | "medium" => Priority::Normal,
            "minor" | "low" | "trivial" => Priority::Minor,
            _ => Priority::Undefined,
        }
    }
}

/// Which contributions of a repository are left out of aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoringOptOuts {
    pub lines: bool,
    pub comments: bool,
    pub approvals: bool,
}

impl ScoringOptOuts {
    /// Build from `skip_scoring` entries; unknown entries are ignored.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut opt_outs = Self::default();
        for label in labels {
            match label.as_ref().trim().to_lowercase().as_str() {
                "lines" => opt_outs.lines = true,
                "comments" => opt_outs.comments = true,
                "approvals" => opt_outs.approvals = true,
                other => log::debug!("Ignoring unknown skip_scoring entry '{other}'"),
            }
        }
        opt_outs
    }

    pub fn is_empty(&self) -> bool {
        !(self.lines || self.comments || self.approvals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentEvent {
    pub author: Identity,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalEvent {
    pub approver: Identity,
    pub at: Option<DateTime<Utc>>,
}

/// One merge request, normalized from the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionRecord {
    pub iid: u64,
    pub title: String,
    pub author: Identity,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    /// `full_path` of the originating repository.
    pub repository: String,
    pub web_url: Option<String>,
    pub jira_key: Option<String>,
    pub priority: Option<Priority>,
    pub ai_coauthored: bool,
    pub comments: Vec<CommentEvent>,
    pub approvals: Vec<ApprovalEvent>,
}

impl ContributionRecord {
    /// Identifier unique across the snapshot, e.g. `group/project!42`.
    pub fn id(&self) -> String {
        format!("{}!{}", self.repository, self.iid)
    }

    pub fn is_merged(&self) -> bool {
        self.state == RecordState::Merged
    }

    pub fn is_own(&self, handle: &str) -> bool {
        self.author.handle == handle
    }

    pub fn lines_changed(&self) -> u64 {
        self.additions + self.deletions
    }

    /// When a comment happened; undated comments take the creation time.
    pub fn comment_time(&self, comment: &CommentEvent) -> DateTime<Utc> {
        comment.at.unwrap_or(self.created_at)
    }

    /// When an approval happened; undated approvals take the merge time,
    /// else the creation time.
    pub fn approval_time(&self, approval: &ApprovalEvent) -> DateTime<Utc> {
        approval.at.or(self.merged_at).unwrap_or(self.created_at)
    }

    /// Days from creation to merge, for merged records with a merge time.
    pub fn lead_time_days(&self) -> Option<f64> {
        if !self.is_merged() {
            return None;
        }
        let merged = self.merged_at?;
        let secs = (merged - self.created_at).num_seconds().max(0);
        Some(secs as f64 / 86_400.0)
    }

    /// Earliest dated comment from someone other than the author.
    /// Equal timestamps keep snapshot order.
    pub fn first_reviewer_comment(&self) -> Option<DateTime<Utc>> {
        self.comments
            .iter()
            .filter(|c| !self.is_own(&c.author.handle))
            .filter_map(|c| c.at)
            .min()
    }

    /// Hours from creation to the first reviewer comment.
    pub fn turnaround_hours(&self) -> Option<f64> {
        let first = self.first_reviewer_comment()?;
        let secs = (first - self.created_at).num_seconds().max(0);
        Some(secs as f64 / 3_600.0)
    }
}

/// A repository and its aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repository {
    pub name: String,
    pub full_path: String,
    pub web_url: Option<String>,
    pub teams: Vec<String>,
    pub opt_outs: ScoringOptOuts,
}

impl Repository {
    pub fn in_team(&self, team: &str) -> bool {
        self.teams.iter().any(|t| t.eq_ignore_ascii_case(team))
    }
}
