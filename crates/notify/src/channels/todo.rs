//! Microsoft To Do notification channel.
//!
//! Mirrors each change event into a task on a named To Do list via the
//! Microsoft Graph API. Authentication uses a long-lived OAuth refresh
//! token exchanged for a short-lived access token on every run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::content::{self, RenderOptions};
use crate::error::ChannelError;
use crate::events::ChangeEvent;
use crate::{NotifyChannel, NotifyOptions};

/// Environment variable for the Azure application (client) id.
const ENV_CLIENT_ID: &str = "MS_TODO_CLIENT_ID";
/// Environment variable for the OAuth refresh token.
const ENV_REFRESH_TOKEN: &str = "MS_TODO_REFRESH_TOKEN";

/// OAuth2 token endpoint (common tenant, personal + work accounts).
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Microsoft Graph API base URL.
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Scopes requested for the access token.
const SCOPES: &str = "Tasks.ReadWrite offline_access";

/// Stored OAuth credentials for the channel.
#[derive(Debug, Clone)]
struct TodoCredentials {
    client_id: String,
    refresh_token: String,
}

/// Microsoft To Do notification channel.
pub struct TodoChannel {
    credentials: Option<TodoCredentials>,
    list_name: String,
    render: RenderOptions,
    client: reqwest::Client,
}

impl TodoChannel {
    /// Create the channel from environment variables.
    ///
    /// The channel is inert unless both the client id and the refresh token
    /// are set.
    #[must_use]
    pub fn from_env(options: &NotifyOptions) -> Self {
        let client_id = std::env::var(ENV_CLIENT_ID).ok();
        let refresh_token = std::env::var(ENV_REFRESH_TOKEN).ok();

        let credentials = match (client_id, refresh_token) {
            (Some(client_id), Some(refresh_token)) => {
                debug!("Microsoft To Do notifications enabled");
                Some(TodoCredentials {
                    client_id,
                    refresh_token,
                })
            }
            _ => {
                debug!("Microsoft To Do notifications disabled (MS_TODO_* not fully set)");
                None
            }
        };

        Self {
            credentials,
            list_name: options.todo_list_name.clone(),
            render: options.render(),
            client: reqwest::Client::new(),
        }
    }

    /// Exchange the refresh token for a short-lived access token.
    async fn acquire_access_token(
        &self,
        credentials: &TodoCredentials,
    ) -> Result<String, ChannelError> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("refresh_token", credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("scope", SCOPES),
        ];

        let response = self.client.post(TOKEN_URL).form(&params).send().await?;

        if response.status().is_success() {
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
            if error.error == "invalid_grant" {
                return Err(ChannelError::Auth(
                    "refresh token expired or revoked; re-run `langwatch auth` \
                     and update MS_TODO_REFRESH_TOKEN"
                        .to_string(),
                ));
            }
        }

        Err(ChannelError::Other(format!(
            "token endpoint returned {status}: {body}"
        )))
    }

    /// Find the configured task list, creating it when absent.
    async fn ensure_list(&self, access_token: &str) -> Result<String, ChannelError> {
        let url = format!("{GRAPH_BASE}/me/todo/lists");

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Other(format!(
                "listing task lists failed with {status}: {body}"
            )));
        }

        let lists: ListCollection = response.json().await?;
        if let Some(list) = lists.value.iter().find(|l| l.display_name == self.list_name) {
            debug!(list = %self.list_name, id = %list.id, "Task list found");
            return Ok(list.id.clone());
        }

        info!(list = %self.list_name, "Task list not found, creating it");
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&CreateList {
                display_name: &self.list_name,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Other(format!(
                "creating task list failed with {status}: {body}"
            )));
        }

        let created: TodoList = response.json().await?;
        Ok(created.id)
    }

    /// Create one task for a change event.
    async fn create_task(
        &self,
        access_token: &str,
        list_id: &str,
        event: &ChangeEvent,
    ) -> Result<(), ChannelError> {
        let url = format!("{GRAPH_BASE}/me/todo/lists/{list_id}/tasks");

        let task = CreateTask {
            title: event.title(),
            body: TaskBody {
                content: content::render_event_text(event, &self.render),
                content_type: "text",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&task)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(path = %event.path, "Task created");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ChannelError::Other(format!(
                "task creation failed with {status}: {body}"
            )))
        }
    }
}

#[async_trait]
impl NotifyChannel for TodoChannel {
    fn name(&self) -> &'static str {
        "todo"
    }

    fn enabled(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send(&self, events: &[ChangeEvent]) -> Result<(), ChannelError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("MS_TODO_*".to_string()))?;

        if events.is_empty() {
            debug!(channel = "todo", "No events, nothing to send");
            return Ok(());
        }

        let access_token = self.acquire_access_token(credentials).await?;
        let list_id = self.ensure_list(&access_token).await?;

        let mut failed = 0usize;
        for event in events {
            if let Err(e) = self.create_task(&access_token, &list_id, event).await {
                warn!(path = %event.path, error = %e, "Failed to create task");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(ChannelError::Other(format!(
                "{failed} of {} tasks failed to create",
                events.len()
            )));
        }

        info!(list = %self.list_name, count = events.len(), "Tasks created");
        Ok(())
    }
}

// =============================================================================
// OAuth and Microsoft Graph API types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct ListCollection {
    value: Vec<TodoList>,
}

#[derive(Debug, Deserialize)]
struct TodoList {
    id: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Serialize)]
struct CreateList<'a> {
    #[serde(rename = "displayName")]
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateTask {
    title: String,
    body: TaskBody,
}

#[derive(Debug, Serialize)]
struct TaskBody {
    content: String,
    #[serde(rename = "contentType")]
    content_type: &'static str,
}
