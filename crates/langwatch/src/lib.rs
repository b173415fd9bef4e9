//! Watches GitHub repository paths for new commits and notifies on change.
//!
//! This crate provides:
//! - JSON monitor config loading with defaults, batch, and glob expansion
//! - Persisted per-path watch state (last observed commit SHA)
//! - Commit polling via the GitHub REST API
//! - A single-pass run coordinator wiring detection to the notify crate
//! - An OAuth helper for the Microsoft To Do channel

pub mod auth;
pub mod config;
pub mod detector;
pub mod github;
pub mod pipeline;
pub mod state;

// Re-export main types
pub use config::{Monitor, MonitorsFile, Settings, WatchPath};
pub use detector::{DetectionOutcome, Detector, PathFailure};
pub use github::{GitHubClient, GitHubError};
pub use pipeline::{Pipeline, PipelineConfig, RunReport};
pub use state::{PathState, WatchState};
