use serde::{Deserialize, Deserializer};

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSnapshot {
    pub generated_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub repositories: Vec<RawRepository>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRepository {
    pub name: Option<String>,
    pub full_path: Option<String>,
    pub web_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub teams: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub skip_scoring: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub merge_requests: Vec<RawMergeRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawMergeRequest {
    pub iid: Option<u64>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub merged_at: Option<String>,
    pub updated_at: Option<String>,
    pub web_url: Option<String>,
    pub author: Option<RawUser>,
    pub additions: Option<u64>,
    pub deletions: Option<u64>,
    pub jira_key: Option<String>,
    pub jira_priority: Option<String>,
    pub ai_coauthored: Option<bool>,
    #[serde(deserialize_with = "nullable")]
    pub commenters: Vec<RawCommenter>,
    #[serde(deserialize_with = "nullable")]
    pub approvers: Vec<RawApprover>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawUser {
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Per-author comment summary on one merge request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCommenter {
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub count: Option<u64>,
    pub commented_at: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub timestamps: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawApprover {
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub approved_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nulls_and_missing_fields_default() {
        let raw: RawSnapshot = serde_json::from_str(
            r#"{
                "generated_at": null,
                "repositories": [{
                    "full_path": "g/r",
                    "teams": null,
                    "merge_requests": [{
                        "created_at": "2025-01-01T00:00:00Z",
                        "additions": null,
                        "commenters": null,
                        "author": null
                    }]
                }]
            }"#,
        )
        .unwrap();
        let repo = &raw.repositories[0];
        assert!(repo.teams.is_empty());
        assert!(repo.skip_scoring.is_empty());
        let mr = &repo.merge_requests[0];
        assert_eq!(mr.additions, None);
        assert!(mr.commenters.is_empty());
        assert!(mr.approvers.is_empty());
        assert!(mr.author.is_none());
    }

    #[test]
    fn test_empty_document() {
        let raw: RawSnapshot = serde_json::from_str("{}").unwrap();
        assert!(raw.repositories.is_empty());
    }
}
