//! Run coordination - orchestrates the full load-detect-notify-persist flow.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use notify::{ChangeEvent, Notifier};

use crate::config::MonitorsFile;
use crate::detector::{Detector, PathFailure};
use crate::github::GitHubClient;
use crate::state::WatchState;

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Monitor config file path.
    pub config_path: PathBuf,
    /// Watch state file path.
    pub state_path: PathBuf,
    /// Detect and report only: skip notifiers and the state save.
    pub dry_run: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/monitors.json"),
            state_path: PathBuf::from("data/state.json"),
            dry_run: false,
        }
    }
}

/// Result of a single run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Paths successfully checked.
    pub checked: usize,
    /// Paths baselined on first sight.
    pub baselined: usize,
    /// Paths with no change.
    pub unchanged: usize,
    /// One event per changed path.
    pub events: Vec<ChangeEvent>,
    /// Per-path failures (non-fatal).
    pub path_failures: Vec<PathFailure>,
    /// Per-channel notifier failures (non-fatal).
    pub notifier_failures: Vec<(String, String)>,
}

impl RunReport {
    /// Number of detected changes.
    #[must_use]
    pub fn changed(&self) -> usize {
        self.events.len()
    }

    /// Whether any non-fatal failure occurred (degraded run, exit code 2).
    #[must_use]
    pub fn degraded(&self) -> bool {
        !self.path_failures.is_empty() || !self.notifier_failures.is_empty()
    }

    /// Whether every attempted check failed (hard failure, exit code 1).
    #[must_use]
    pub fn all_checks_failed(&self) -> bool {
        self.checked == 0 && !self.path_failures.is_empty()
    }
}

/// Run coordinator: one synchronous pass per invocation.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Execute one pass: load config and state, detect changes, dispatch
    /// notifiers, persist state.
    ///
    /// Only config load/parse and the final state save are fatal; every
    /// other failure is isolated and reported through the [`RunReport`].
    pub async fn run(&self) -> Result<RunReport> {
        info!("Starting check run");

        let file = MonitorsFile::load(&self.config.config_path)?;
        let monitors = file.resolve()?;
        let settings = file.settings.clone();

        let mut state = WatchState::load(&self.config.state_path);
        info!(entries = state.len(), "Loaded watch state");

        let token = std::env::var("GITHUB_TOKEN").ok();
        if token.is_none() {
            warn!("GITHUB_TOKEN not set; unauthenticated requests are rate limited");
        }
        let client = GitHubClient::new(token).context("Failed to create GitHub client")?;

        let detector = Detector::new(&client);
        let outcome = detector.run(&monitors, &mut state).await;
        state.mark_checked();

        let mut report = RunReport {
            checked: outcome.checked,
            baselined: outcome.baselined,
            unchanged: outcome.unchanged,
            events: outcome.events,
            path_failures: outcome.failures,
            notifier_failures: vec![],
        };

        if report.events.is_empty() {
            info!("No changes detected");
        } else if self.config.dry_run {
            info!(count = report.events.len(), "Dry run, skipping notifiers");
        } else {
            let notifier = Notifier::from_env(&settings.notify_options());
            if notifier.has_channels() {
                for (channel, result) in notifier.dispatch(&report.events).await {
                    if let Err(e) = result {
                        report.notifier_failures.push((channel, e.to_string()));
                    }
                }
            } else {
                warn!("Changes detected but no notification channels are configured");
            }
        }

        if self.config.dry_run {
            info!("Dry run, state not saved");
        } else {
            state
                .save(&self.config.state_path)
                .context("Failed to save watch state")?;
            info!(path = %self.config.state_path.display(), "Watch state saved");
        }

        info!(
            checked = report.checked,
            changed = report.changed(),
            baselined = report.baselined,
            unchanged = report.unchanged,
            path_failures = report.path_failures.len(),
            notifier_failures = report.notifier_failures.len(),
            "Check run complete"
        );

        Ok(report)
    }
}
