//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when sending notifications.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Email message could not be built
    #[error("Failed to build email message: {0}")]
    Email(#[from] lettre::error::Error),

    /// Email address could not be parsed
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// SMTP transport failed
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Authorization failed in a user-actionable way (expired/revoked
    /// refresh token). The message carries remediation instructions.
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}
