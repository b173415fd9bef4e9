//! GitHub API client for commit polling.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::types::{CommitInfo, TreeResponse};

const GITHUB_API_URL: &str = "https://api.github.com";

/// Errors from the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Repository, branch, or path does not exist
    #[error("repository or path not found")]
    NotFound,

    /// Public rate limit exhausted or token lacks access
    #[error("rate limited or insufficient permissions")]
    RateLimited,

    /// Any other non-success response
    #[error("GitHub API error: {status} - {body}")]
    Api { status: u16, body: String },
}

/// GitHub API client for read-only commit queries.
///
/// Requests are unauthenticated (subject to the public rate limit) unless a
/// token is provided, in which case it is attached as a bearer token.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a new client against the public GitHub API.
    pub fn new(token: Option<String>) -> Result<Self, GitHubError> {
        Self::with_base_url(GITHUB_API_URL, token)
    }

    /// Create a client against a different base URL (tests, GHE).
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("langwatch/0.3"));

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token,
        })
    }

    /// Latest commit touching `path` on `branch`, or `None` when the path
    /// has no commit history.
    ///
    /// `path` may be a file or a folder prefix; the endpoint scopes the
    /// listing either way.
    pub async fn latest_commit(
        &self,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<CommitInfo>, GitHubError> {
        let url = format!(
            "{}/repos/{}/commits?sha={}&path={}&per_page=1",
            self.base_url,
            repo,
            urlencoding::encode(branch),
            urlencoding::encode(path)
        );

        let commits: Vec<CommitInfo> = self.get_json(&url).await?;
        Ok(commits.into_iter().next())
    }

    /// All blob paths in the repository tree on `branch`.
    pub async fn repo_tree(&self, repo: &str, branch: &str) -> Result<Vec<String>, GitHubError> {
        let url = format!(
            "{}/repos/{}/git/trees/{}?recursive=1",
            self.base_url,
            repo,
            urlencoding::encode(branch)
        );

        let response: TreeResponse = self.get_json(&url).await?;
        if response.truncated {
            debug!(repo, branch, "Repository tree was truncated by the API");
        }

        Ok(response
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, GitHubError> {
        debug!(url, "GitHub API request");

        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        match status.as_u16() {
            404 => Err(GitHubError::NotFound),
            403 | 429 => Err(GitHubError::RateLimited),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(GitHubError::Api {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
