//! GitHub REST API access (read-only commit queries).

mod client;
mod types;

pub use client::{GitHubClient, GitHubError};
pub use types::{CommitDetail, CommitIdentity, CommitInfo};
