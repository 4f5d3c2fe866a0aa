pub mod record;
pub mod schema;

pub use record::{
    ApprovalEvent, CommentEvent, ContributionRecord, Identity, Priority, RecordState, Repository,
    ScoringOptOuts,
};

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::date_util::parse_timestamp;
use crate::error::{Error, Result};
use crate::url::{parse_gitlab_url, repository_name, GitLabUrlInfo};
use schema::{RawCommenter, RawMergeRequest, RawRepository, RawSnapshot};

static RE_JIRA_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][A-Z0-9]+-\d+)").unwrap());

/// Immutable, normalized view of one snapshot document.
///
/// Records keep the order of the document: repositories in listed order,
/// merge requests in listed order within each repository.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    generated_at: Option<DateTime<Utc>>,
    repositories: Vec<Repository>,
    records: Vec<ContributionRecord>,
}

impl Snapshot {
    /// Load and normalize a snapshot file.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |message: String| Error::SnapshotLoad {
            path: path.display().to_string(),
            message,
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| load_err(e.to_string()))?;
        let snapshot = Self::from_json(&text).map_err(|e| load_err(e.to_string()))?;

        log::info!(
            "Loaded {} merge requests from {} repositories ({})",
            snapshot.records.len(),
            snapshot.repositories.len(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Parse and normalize a snapshot document.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: RawSnapshot) -> Self {
        let generated_at = raw.generated_at.as_deref().and_then(parse_timestamp);
        let mut repositories = Vec::with_capacity(raw.repositories.len());
        let mut records = Vec::new();

        for (index, raw_repo) in raw.repositories.into_iter().enumerate() {
            let repo = normalize_repository(&raw_repo, index);
            for mr in &raw_repo.merge_requests {
                if let Some(record) = normalize_merge_request(mr, &repo) {
                    records.push(record);
                }
            }
            repositories.push(repo);
        }

        Self {
            generated_at,
            repositories,
            records,
        }
    }

    /// Build a snapshot directly from normalized parts.
    pub fn from_parts(repositories: Vec<Repository>, records: Vec<ContributionRecord>) -> Self {
        Self {
            generated_at: None,
            repositories,
            records,
        }
    }

    pub fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.generated_at
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn records(&self) -> &[ContributionRecord] {
        &self.records
    }

    pub fn repository(&self, full_path: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.full_path == full_path)
    }

    /// All team names, sorted and deduplicated.
    pub fn teams(&self) -> Vec<&str> {
        let mut teams: Vec<&str> = self
            .repositories
            .iter()
            .flat_map(|r| r.teams.iter().map(String::as_str))
            .collect();
        teams.sort_unstable();
        teams.dedup();
        teams
    }
}

fn normalize_repository(raw: &RawRepository, index: usize) -> Repository {
    let from_url = raw
        .web_url
        .as_deref()
        .and_then(|u| parse_gitlab_url(u).ok())
        .map(|info| info.full_path().to_string());

    let full_path = raw
        .full_path
        .clone()
        .filter(|p| !p.trim().is_empty())
        .or(from_url)
        .unwrap_or_else(|| {
            log::warn!("Repository #{index} has no full_path or web_url");
            format!("repository-{index}")
        });

    let name = raw
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| repository_name(&full_path).to_string());

    Repository {
        name,
        full_path,
        web_url: raw.web_url.clone(),
        teams: raw.teams.clone(),
        opt_outs: ScoringOptOuts::from_labels(raw.skip_scoring.as_slice()),
    }
}

fn normalize_merge_request(raw: &RawMergeRequest, repo: &Repository) -> Option<ContributionRecord> {
    let Some(created_at) = raw.created_at.as_deref().and_then(parse_timestamp) else {
        log::warn!(
            "Dropping merge request {} in {}: missing or invalid created_at",
            raw.web_url.as_deref().unwrap_or("<no url>"),
            repo.full_path
        );
        return None;
    };

    let iid = raw.iid.or_else(|| {
        raw.web_url
            .as_deref()
            .and_then(|u| parse_gitlab_url(u).ok())
            .and_then(|info| match info {
                GitLabUrlInfo::MergeRequest { iid, .. } => Some(iid),
                GitLabUrlInfo::Project { .. } => None,
            })
    });

    let title = raw.title.clone().unwrap_or_default();
    let jira_key = raw
        .jira_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| RE_JIRA_KEY.captures(&title).map(|c| c[1].to_string()));

    let author = match &raw.author {
        Some(a) => Identity::new(a.username.as_deref(), a.name.as_deref(), a.avatar_url.as_deref()),
        None => Identity::new(None, None, None),
    };

    let merged_at = raw.merged_at.as_deref().and_then(parse_timestamp);

    let comments = raw.commenters.iter().flat_map(expand_commenter).collect();
    let approvals = raw
        .approvers
        .iter()
        .map(|a| ApprovalEvent {
            approver: Identity::new(a.username.as_deref(), a.name.as_deref(), a.avatar_url.as_deref()),
            at: a.approved_at.as_deref().and_then(parse_timestamp),
        })
        .collect();

    Some(ContributionRecord {
        iid: iid.unwrap_or(0),
        title,
        author,
        state: raw
            .state
            .as_deref()
            .map(RecordState::from_label)
            .unwrap_or(RecordState::Open),
        created_at,
        merged_at,
        additions: raw.additions.unwrap_or(0),
        deletions: raw.deletions.unwrap_or(0),
        repository: repo.full_path.clone(),
        web_url: raw.web_url.clone(),
        jira_key,
        priority: raw
            .jira_priority
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(Priority::from_label),
        ai_coauthored: raw.ai_coauthored.unwrap_or(false),
        comments,
        approvals,
    })
}

/// Upper bound on events synthesized from a commenter's `count`.
pub const MAX_COMMENTS_PER_COMMENTER: u64 = 10_000;

/// One event per listed timestamp, or `count` events (default 1) with
/// `commented_at` on the first.
fn expand_commenter(raw: &RawCommenter) -> Vec<CommentEvent> {
    let author = Identity::new(raw.username.as_deref(), raw.name.as_deref(), raw.avatar_url.as_deref());

    if !raw.timestamps.is_empty() {
        return raw
            .timestamps
            .iter()
            .map(|t| CommentEvent {
                author: author.clone(),
                at: parse_timestamp(t),
            })
            .collect();
    }

    let first_at = raw.commented_at.as_deref().and_then(parse_timestamp);
    let mut count = raw.count.unwrap_or(1);
    if count > MAX_COMMENTS_PER_COMMENTER {
        log::warn!(
            "Capping comment count {count} for '{}' at {MAX_COMMENTS_PER_COMMENTER}",
            author.handle
        );
        count = MAX_COMMENTS_PER_COMMENTER;
    }
    (0..count)
        .map(|i| CommentEvent {
            author: author.clone(),
            at: if i == 0 { first_at } else { None },
        })
        .collect()
}
