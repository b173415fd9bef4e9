//! Microsoft To Do authorization helper.
//!
//! Obtains the long-lived OAuth refresh token the To Do channel needs:
//! prints the authorization URL, receives the code on a local one-shot
//! callback server, exchanges it for tokens, and prints the secrets to
//! configure.

use anyhow::{bail, Context, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

const AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const SCOPES: &str = "Tasks.ReadWrite offline_access";

/// How long to wait for the browser callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared sender the callback handler uses to hand over the code.
#[derive(Clone)]
struct CallbackState {
    tx: Arc<Mutex<Option<oneshot::Sender<Result<String, String>>>>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    refresh_token: String,
}

/// Run the interactive authorization flow.
pub async fn run(client_id: Option<String>, port: u16) -> Result<()> {
    let client_id = match client_id.or_else(|| std::env::var("MS_TODO_CLIENT_ID").ok()) {
        Some(id) if !id.is_empty() => id,
        _ => bail!(
            "No client id. Pass --client-id or set MS_TODO_CLIENT_ID \
             (the application id of your Azure app registration)."
        ),
    };

    let redirect_uri = format!("http://localhost:{port}/callback");

    let (tx, rx) = oneshot::channel();
    let state = CallbackState {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new().route("/callback", get(callback)).with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{port}"))?;
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let auth_url = format!(
        "{AUTH_URL}?client_id={}&response_type=code&redirect_uri={}&scope={}&response_mode=query",
        urlencoding::encode(&client_id),
        urlencoding::encode(&redirect_uri),
        urlencoding::encode(SCOPES)
    );

    println!("Open this URL in a browser and sign in:");
    println!();
    println!("  {auth_url}");
    println!();
    println!("Waiting for the authorization callback (5 minute timeout)...");

    let code = tokio::time::timeout(CALLBACK_TIMEOUT, rx)
        .await
        .context("Timed out waiting for the authorization callback")?
        .context("Callback server closed unexpectedly")?
        .map_err(|e| anyhow::anyhow!("Authorization failed: {e}"))?;

    server.abort();
    debug!("Authorization code received, exchanging for tokens");

    let tokens = exchange_code(&client_id, &code, &redirect_uri).await?;

    println!();
    println!("Authorization succeeded. Configure these secrets for the watcher:");
    println!();
    println!("  MS_TODO_CLIENT_ID={client_id}");
    println!("  MS_TODO_REFRESH_TOKEN={}", tokens.refresh_token);
    println!();
    println!("Keep the refresh token out of the repository. It expires eventually;");
    println!("re-run `langwatch auth` when the To Do channel reports an auth failure.");

    Ok(())
}

/// One-shot OAuth callback handler.
async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<String> {
    let result = match params.get("code") {
        Some(code) => Ok(code.clone()),
        None => Err(params
            .get("error")
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string())),
    };

    let page = match &result {
        Ok(_) => success_page(),
        Err(error) => failure_page(error),
    };

    if let Ok(mut guard) = state.tx.lock() {
        if let Some(tx) = guard.take() {
            let _ = tx.send(result);
        }
    }

    Html(page)
}

async fn exchange_code(client_id: &str, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
    let params = [
        ("client_id", client_id),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
        ("scope", SCOPES),
    ];

    let client = reqwest::Client::new();
    let response = client
        .post(TOKEN_URL)
        .form(&params)
        .send()
        .await
        .context("Token request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("Token exchange failed with {status}: {body}");
    }

    response.json().await.context("Failed to parse token response")
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Authorized</title></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; text-align: center; padding-top: 80px;">
    <h1>Authorization succeeded</h1>
    <p>Return to the terminal for the refresh token. You can close this page.</p>
</body>
</html>"#
        .to_string()
}

fn failure_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Authorization failed</title></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; text-align: center; padding-top: 80px;">
    <h1>Authorization failed</h1>
    <p>{}</p>
</body>
</html>"#,
        html_escape(error)
    )
}

/// Minimal escaping for the error echo in the failure page.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> (CallbackState, oneshot::Receiver<Result<String, String>>) {
        let (tx, rx) = oneshot::channel();
        (
            CallbackState {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn test_callback_with_code() {
        let (state, rx) = state();
        let mut params = HashMap::new();
        params.insert("code".to_string(), "auth-code-123".to_string());

        let page = callback(State(state), Query(params)).await;
        assert!(page.0.contains("succeeded"));
        assert_eq!(rx.await.unwrap(), Ok("auth-code-123".to_string()));
    }

    #[tokio::test]
    async fn test_callback_with_error() {
        let (state, rx) = state();
        let mut params = HashMap::new();
        params.insert("error".to_string(), "access_denied".to_string());

        let page = callback(State(state), Query(params)).await;
        assert!(page.0.contains("failed"));
        assert_eq!(rx.await.unwrap(), Err("access_denied".to_string()));
    }

    #[tokio::test]
    async fn test_second_callback_is_ignored() {
        let (state, _rx) = state();
        let mut params = HashMap::new();
        params.insert("code".to_string(), "first".to_string());

        let _ = callback(State(state.clone()), Query(params.clone())).await;
        // The sender was consumed; a second hit must not panic.
        let page = callback(State(state), Query(params)).await;
        assert!(page.0.contains("succeeded"));
    }
}
