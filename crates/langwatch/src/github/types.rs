//! GitHub REST API response types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One commit from the commit-listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub commit: CommitDetail,
}

impl CommitInfo {
    /// First line of the commit message.
    #[must_use]
    pub fn summary(&self) -> &str {
        self.commit.message.lines().next().unwrap_or_default()
    }
}

/// The `commit` object nested in a commit listing entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub message: String,
    pub author: CommitIdentity,
    pub committer: CommitIdentity,
}

/// Git author/committer identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitIdentity {
    pub name: String,
    pub date: DateTime<Utc>,
}

/// Response of the recursive tree endpoint.
#[derive(Debug, Deserialize)]
pub struct TreeResponse {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// One entry in a repository tree.
#[derive(Debug, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_summary_takes_first_line() {
        let commit: CommitInfo = serde_json::from_str(
            r#"{
                "sha": "abc",
                "commit": {
                    "message": "Update strings\n\nLonger body here.",
                    "author": { "name": "Jane", "date": "2026-01-10T12:00:00Z" },
                    "committer": { "name": "GitHub", "date": "2026-01-10T12:00:00Z" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(commit.summary(), "Update strings");
    }

    #[test]
    fn test_tree_response_parses() {
        let tree: TreeResponse = serde_json::from_str(
            r#"{
                "sha": "abc",
                "tree": [
                    { "path": "lang/en.json", "type": "blob", "mode": "100644" },
                    { "path": "lang", "type": "tree" }
                ],
                "truncated": false
            }"#,
        )
        .unwrap();

        assert_eq!(tree.tree.len(), 2);
        assert_eq!(tree.tree[0].kind, "blob");
        assert!(!tree.truncated);
    }
}
