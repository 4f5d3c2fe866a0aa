use crate::error::{Error, Result};

/// Identifiers recoverable from a GitLab web URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitLabUrlInfo {
    Project {
        full_path: String,
    },
    MergeRequest {
        full_path: String,
        iid: u64,
    },
}

impl GitLabUrlInfo {
    pub fn full_path(&self) -> &str {
        match self {
            GitLabUrlInfo::Project { full_path } | GitLabUrlInfo::MergeRequest { full_path, .. } => {
                full_path
            }
        }
    }
}

/// Parse a GitLab project or merge request URL.
///
/// Supported URL patterns:
/// - `https://gitlab.com/<group>/<subgroup>/<project>`
/// - `https://gitlab.com/<group>/<project>/-/merge_requests/<iid>`
///
/// Any host is accepted so self-managed instances work too.
pub fn parse_gitlab_url(input: &str) -> Result<GitLabUrlInfo> {
    let url = url::Url::parse(input.trim()).map_err(|e| Error::UrlParse(e.to_string()))?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    // Everything before the `-` separator is the namespace path.
    let split = segments.iter().position(|s| *s == "-");
    let (path, rest) = match split {
        Some(i) => (&segments[..i], &segments[i + 1..]),
        None => (&segments[..], &[][..]),
    };

    if path.len() < 2 {
        return Err(Error::UrlParse(format!(
            "expected <namespace>/<project> in URL: {input}"
        )));
    }
    let full_path = path.join("/");

    match rest {
        [] => Ok(GitLabUrlInfo::Project { full_path }),
        ["merge_requests", iid, ..] => {
            let iid = iid
                .parse()
                .map_err(|_| Error::UrlParse(format!("invalid merge request number in URL: {input}")))?;
            Ok(GitLabUrlInfo::MergeRequest { full_path, iid })
        }
        _ => Ok(GitLabUrlInfo::Project { full_path }),
    }
}

/// Short display name of a project: the last segment of its path.
pub fn repository_name(full_path: &str) -> &str {
    full_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(full_path)
}
