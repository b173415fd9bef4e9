//! Change event type consumed by notification channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detected change to a watched repository path.
///
/// Produced once per changed path per run, consumed by notification
/// channels, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Name of the monitor that watches this path.
    pub monitor: String,
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Branch the path is watched on.
    pub branch: String,
    /// The watched path, without any trailing slash.
    pub path: String,
    /// Whether the path is a folder prefix rather than a single file.
    #[serde(default)]
    pub folder: bool,
    /// Commit SHA recorded on the previous run.
    pub old_sha: String,
    /// Latest commit SHA touching the path.
    pub new_sha: String,
    /// Author of the latest commit.
    pub author: String,
    /// First line of the latest commit message.
    pub message: String,
    /// Commit timestamp.
    pub committed_at: DateTime<Utc>,
}

impl ChangeEvent {
    /// Short title for task/notification headers.
    #[must_use]
    pub fn title(&self) -> String {
        format!("{}: {}", self.monitor, self.path)
    }

    /// GitHub compare view between the old and new commits.
    #[must_use]
    pub fn compare_url(&self) -> String {
        format!(
            "https://github.com/{}/compare/{}...{}",
            self.repo,
            short_sha(&self.old_sha),
            short_sha(&self.new_sha)
        )
    }

    /// GitHub commit view for the new commit.
    #[must_use]
    pub fn commit_url(&self) -> String {
        format!("https://github.com/{}/commit/{}", self.repo, self.new_sha)
    }

    /// GitHub view of the watched path on the monitored branch.
    ///
    /// Files link to the blob view, folders to the tree view.
    #[must_use]
    pub fn file_url(&self) -> String {
        let view = if self.folder { "tree" } else { "blob" };
        format!(
            "https://github.com/{}/{}/{}/{}",
            self.repo, view, self.branch, self.path
        )
    }

    /// Repository basename (`name` from `owner/name`).
    #[must_use]
    pub fn repo_basename(&self) -> &str {
        self.repo.rsplit('/').next().unwrap_or(&self.repo)
    }
}

/// Abbreviate a commit SHA for display.
fn short_sha(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}
