//! Persisted watch state.
//!
//! Tracks the last observed commit per watched path across runs. The state
//! is an explicit value loaded at the start of a run, threaded through the
//! detector, and saved once at the end.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Last observed commit for one watched path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathState {
    /// Commit SHA recorded on the last run that saw this path.
    pub last_sha: String,
    /// When the path was last checked.
    pub checked_at: DateTime<Utc>,
}

/// Persisted mapping of watched paths to their last observed commit.
///
/// Keys are `repo:branch:path`. Entries are created on first successful
/// check, updated every run, and never deleted automatically. A BTreeMap
/// keeps the serialized file stable under version control.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatchState {
    /// Per-path state, keyed by `repo:branch:path`.
    #[serde(default)]
    pub monitors: BTreeMap<String, PathState>,
    /// When the last full run completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
}

impl WatchState {
    /// Composite key for one watched path.
    #[must_use]
    pub fn key(repo: &str, branch: &str, path: &str) -> String {
        format!("{repo}:{branch}:{path}")
    }

    /// Load state from a JSON file.
    ///
    /// A missing, unreadable, or corrupt file degrades to the empty state:
    /// every path is treated as first-seen on this run, which records fresh
    /// baselines instead of notifying.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "State file is corrupt, starting from an empty baseline"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to read state file, starting from an empty baseline"
                );
                Self::default()
            }
        }
    }

    /// Save state to a JSON file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write state file {}", path.display()))?;
        Ok(())
    }

    /// SHA recorded for a key on a previous run, if any.
    #[must_use]
    pub fn last_sha(&self, key: &str) -> Option<&str> {
        self.monitors.get(key).map(|s| s.last_sha.as_str())
    }

    /// Record (or replace) the observed SHA for a key.
    pub fn record(&mut self, key: String, sha: String) {
        self.monitors.insert(
            key,
            PathState {
                last_sha: sha,
                checked_at: Utc::now(),
            },
        );
    }

    /// Refresh the checked-at timestamp for an unchanged key.
    pub fn touch(&mut self, key: &str) {
        if let Some(entry) = self.monitors.get_mut(key) {
            entry.checked_at = Utc::now();
        }
    }

    /// Mark a full run as completed.
    pub fn mark_checked(&mut self) {
        self.last_check = Some(Utc::now());
    }

    /// Number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Whether any path has been tracked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}
