//! Notification channel implementations.

pub mod email;
pub mod todo;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::ChangeEvent;

/// Trait for notification channels (email, Microsoft To Do, etc.).
///
/// Channels receive the full batch of events for a run; a channel decides
/// itself whether that becomes one message or one call per event.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Deliver the run's change events through this channel.
    async fn send(&self, events: &[ChangeEvent]) -> Result<(), ChannelError>;
}
