//! Change detection against the persisted watch state.
//!
//! For each enabled monitor, queries the latest commit touching each watched
//! path and compares its SHA to the stored one. Failures are isolated to the
//! path (or, for glob expansion, the monitor) they occurred in.

use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use notify::ChangeEvent;

use crate::config::{Monitor, WatchPath};
use crate::github::GitHubClient;
use crate::state::WatchState;

/// A non-fatal failure while checking a single path (or expanding one
/// monitor's glob patterns).
#[derive(Debug, Clone)]
pub struct PathFailure {
    pub monitor: String,
    pub repo: String,
    pub path: String,
    pub error: String,
}

/// Counters and events from one detection pass.
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    /// Paths successfully checked (baseline, changed, or unchanged).
    pub checked: usize,
    /// Paths seen for the first time this run.
    pub baselined: usize,
    /// Paths whose SHA matched the stored one.
    pub unchanged: usize,
    /// One event per changed path.
    pub events: Vec<ChangeEvent>,
    /// Per-path failures; the rest of the run proceeded.
    pub failures: Vec<PathFailure>,
}

/// Compares the latest commit per watched path against the stored state.
pub struct Detector<'a> {
    client: &'a GitHubClient,
}

impl<'a> Detector<'a> {
    #[must_use]
    pub const fn new(client: &'a GitHubClient) -> Self {
        Self { client }
    }

    /// Run detection over all monitors, updating `state` in place.
    ///
    /// Disabled monitors are skipped without any API call or state touch.
    /// The same `(repo, branch, path)` key is only checked once per run,
    /// even when several monitors cover it.
    pub async fn run(&self, monitors: &[Monitor], state: &mut WatchState) -> DetectionOutcome {
        let mut outcome = DetectionOutcome::default();
        let mut checked_keys: HashSet<String> = HashSet::new();

        for monitor in monitors {
            if !monitor.enabled {
                info!(monitor = %monitor.name, "Skipping disabled monitor");
                continue;
            }

            info!(monitor = %monitor.name, repo = %monitor.repo, "Checking monitor");

            let mut paths = monitor.paths.clone();
            if !monitor.glob_patterns.is_empty() {
                match self.expand_globs(monitor).await {
                    Ok(mut expanded) => paths.append(&mut expanded),
                    Err(e) => {
                        warn!(monitor = %monitor.name, error = %e, "Failed to expand glob patterns");
                        outcome.failures.push(PathFailure {
                            monitor: monitor.name.clone(),
                            repo: monitor.repo.clone(),
                            path: monitor.glob_patterns.join(", "),
                            error: format!("{e:#}"),
                        });
                    }
                }
            }

            for path in paths {
                let key = WatchState::key(&monitor.repo, &monitor.branch, path.as_str());
                if !checked_keys.insert(key.clone()) {
                    debug!(key = %key, "Already checked this run");
                    continue;
                }

                self.check_path(monitor, &path, key, state, &mut outcome).await;
            }
        }

        outcome
    }

    /// Check one path and fold the result into the outcome and state.
    async fn check_path(
        &self,
        monitor: &Monitor,
        path: &WatchPath,
        key: String,
        state: &mut WatchState,
        outcome: &mut DetectionOutcome,
    ) {
        let commit = match self
            .client
            .latest_commit(&monitor.repo, &monitor.branch, path.as_str())
            .await
        {
            Ok(Some(commit)) => commit,
            Ok(None) => {
                debug!(path = path.as_str(), "No commit history for path");
                return;
            }
            Err(e) => {
                warn!(
                    monitor = %monitor.name,
                    path = path.as_str(),
                    error = %e,
                    "Path check failed"
                );
                outcome.failures.push(PathFailure {
                    monitor: monitor.name.clone(),
                    repo: monitor.repo.clone(),
                    path: path.as_str().to_string(),
                    error: e.to_string(),
                });
                return;
            }
        };

        outcome.checked += 1;
        let previous = state.last_sha(&key).map(ToString::to_string);

        match previous {
            None => {
                debug!(path = path.as_str(), sha = %commit.sha, "Recording baseline");
                state.record(key, commit.sha);
                outcome.baselined += 1;
            }
            Some(prev) if prev != commit.sha => {
                info!(
                    path = path.as_str(),
                    old = %prev,
                    new = %commit.sha,
                    "Change detected"
                );
                outcome.events.push(ChangeEvent {
                    monitor: monitor.name.clone(),
                    repo: monitor.repo.clone(),
                    branch: monitor.branch.clone(),
                    path: path.as_str().to_string(),
                    folder: path.is_folder(),
                    old_sha: prev,
                    new_sha: commit.sha.clone(),
                    author: commit.commit.author.name.clone(),
                    message: commit.summary().to_string(),
                    committed_at: commit.commit.committer.date,
                });
                state.record(key, commit.sha);
            }
            Some(_) => {
                debug!(path = path.as_str(), "No change");
                state.touch(&key);
                outcome.unchanged += 1;
            }
        }
    }

    /// Expand the monitor's glob patterns against the repository tree.
    ///
    /// The tree is fetched once per monitor, and only when patterns exist.
    async fn expand_globs(&self, monitor: &Monitor) -> Result<Vec<WatchPath>> {
        let tree = self
            .client
            .repo_tree(&monitor.repo, &monitor.branch)
            .await
            .with_context(|| format!("Failed to fetch tree for {}", monitor.repo))?;

        let mut matched = Vec::new();
        for pattern in &monitor.glob_patterns {
            let compiled = glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid glob pattern '{pattern}'"))?;

            let before = matched.len();
            matched.extend(
                tree.iter()
                    .filter(|path| compiled.matches(path))
                    .cloned()
                    .map(WatchPath::File),
            );

            let count = matched.len() - before;
            if count == 0 {
                warn!(pattern = %pattern, repo = %monitor.repo, "Glob pattern matched no files");
            } else {
                debug!(pattern = %pattern, count, "Expanded glob pattern");
            }
        }

        Ok(matched)
    }
}
