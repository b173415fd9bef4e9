//! Notification system for watched repository changes.
//!
//! This crate delivers change events detected by the watcher to the
//! configured channels: a summary email over SMTP, and optionally one
//! Microsoft To Do task per change.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{Notifier, NotifyOptions};
//!
//! # async fn run(events: Vec<notify::ChangeEvent>) {
//! // Create notifier from environment variables
//! let notifier = Notifier::from_env(&NotifyOptions::default());
//!
//! // Deliver the run's events and inspect per-channel results
//! for (channel, result) in notifier.dispatch(&events).await {
//!     if let Err(e) = result {
//!         eprintln!("{channel} failed: {e}");
//!     }
//! }
//! # }
//! ```
//!
//! # Configuration
//!
//! Channels auto-detect their configuration from environment variables:
//!
//! - `EMAIL_SMTP_SERVER`, `EMAIL_SMTP_PORT`, `EMAIL_USERNAME`,
//!   `EMAIL_PASSWORD`, `EMAIL_TO`: enable the email channel
//! - `MS_TODO_CLIENT_ID`, `MS_TODO_REFRESH_TOKEN`: enable the To Do channel
//! - `NOTIFY_DISABLED`: set to "true" to disable all notifications
//!
//! # Architecture
//!
//! The notification system uses a trait-based channel design:
//!
//! - [`NotifyChannel`] trait defines the interface for notification channels
//! - [`EmailChannel`] sends one summary email per run
//! - [`TodoChannel`] creates one To Do task per change event
//! - [`Notifier`] dispatches events to all enabled channels sequentially
//!   and reports per-channel results, so a failed channel surfaces in the
//!   caller's exit status without blocking the others

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod content;
pub mod error;
pub mod events;

pub use channels::email::{EmailChannel, EmailConfig};
pub use channels::todo::TodoChannel;
pub use channels::NotifyChannel;
pub use content::RenderOptions;
pub use error::ChannelError;
pub use events::ChangeEvent;

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Presentation settings shared by the channels, taken from the monitor
/// config file.
#[derive(Debug, Clone)]
pub struct NotifyOptions {
    /// Subject prefix for the summary email.
    pub subject_prefix: String,
    /// Sender display name for the summary email.
    pub sender_name: String,
    /// Include the compare/diff link per event.
    pub include_diff_link: bool,
    /// Include the first line of the commit message per event.
    pub include_commit_message: bool,
    /// Name of the To Do list that receives tasks.
    pub todo_list_name: String,
}

impl Default for NotifyOptions {
    fn default() -> Self {
        Self {
            subject_prefix: "[langwatch]".to_string(),
            sender_name: "langwatch".to_string(),
            include_diff_link: true,
            include_commit_message: true,
            todo_list_name: "Langwatch".to_string(),
        }
    }
}

impl NotifyOptions {
    /// Body rendering switches derived from these options.
    #[must_use]
    pub const fn render(&self) -> RenderOptions {
        RenderOptions {
            include_diff_link: self.include_diff_link,
            include_commit_message: self.include_commit_message,
        }
    }
}

/// Central notification dispatcher.
///
/// The `Notifier` manages the configured channels and delivers each run's
/// events to all of them, collecting per-channel results.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a new notifier from environment variables.
    ///
    /// Auto-detects which channels are configured and enables them
    /// accordingly.
    #[must_use]
    pub fn from_env(options: &NotifyOptions) -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self {
                channels: vec![],
                disabled: true,
            };
        }

        let mut channels: Vec<Arc<dyn NotifyChannel>> = vec![];

        let email = EmailChannel::from_env(options);
        if email.enabled() {
            info!("Email notifications enabled");
            channels.push(Arc::new(email));
        }

        let todo = TodoChannel::from_env(options);
        if todo.enabled() {
            info!("Microsoft To Do notifications enabled");
            channels.push(Arc::new(todo));
        }

        if channels.is_empty() {
            warn!("No notification channels configured");
        } else {
            info!(
                channel_count = channels.len(),
                "Notification system initialized"
            );
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Deliver the events through every enabled channel, sequentially.
    ///
    /// Returns each channel's result so the caller can fold failures into
    /// its exit status. With no events or no channels this is a no-op.
    pub async fn dispatch(
        &self,
        events: &[ChangeEvent],
    ) -> Vec<(String, Result<(), ChannelError>)> {
        if self.disabled || self.channels.is_empty() {
            return vec![];
        }

        if events.is_empty() {
            debug!("No events to dispatch");
            return vec![];
        }

        let mut results = vec![];

        for channel in &self.channels {
            let channel_name = channel.name().to_string();

            if !channel.enabled() {
                debug!(channel = %channel_name, "Channel disabled, skipping");
                continue;
            }

            let result = channel.send(events).await;
            match &result {
                Ok(()) => debug!(channel = %channel_name, "Notification sent"),
                Err(e) => warn!(channel = %channel_name, error = %e, "Failed to send notification"),
            }
            results.push((channel_name, result));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, _events: &[ChangeEvent]) -> Result<(), ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChannelError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn event() -> ChangeEvent {
        ChangeEvent {
            monitor: "app".to_string(),
            repo: "acme/app".to_string(),
            branch: "main".to_string(),
            path: "lang/en.json".to_string(),
            folder: false,
            old_sha: "aaa".to_string(),
            new_sha: "bbb".to_string(),
            author: "Jane".to_string(),
            message: "update".to_string(),
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
        assert_eq!(notifier.channel_count(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_skips_empty_events() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = Notifier::with_channels(vec![Arc::new(CountingChannel {
            calls: calls.clone(),
            fail: false,
        })]);

        let results = notifier.dispatch(&[]).await;
        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_collects_failures_without_aborting() {
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let ok_calls = Arc::new(AtomicUsize::new(0));

        let notifier = Notifier::with_channels(vec![
            Arc::new(CountingChannel {
                calls: failing_calls.clone(),
                fail: true,
            }),
            Arc::new(CountingChannel {
                calls: ok_calls.clone(),
                fail: false,
            }),
        ]);

        let results = notifier.dispatch(&[event()]).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
    }
}
