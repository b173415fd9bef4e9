//! Email notification channel.
//!
//! Sends one summary email per run over authenticated SMTP. Port 465 uses
//! implicit TLS, anything else STARTTLS, matching what mail providers
//! expect on those ports.

use async_trait::async_trait;
use chrono::Utc;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::content::{self, RenderOptions};
use crate::error::ChannelError;
use crate::events::ChangeEvent;
use crate::{NotifyChannel, NotifyOptions};

/// Environment variable for the SMTP server hostname.
const ENV_SMTP_SERVER: &str = "EMAIL_SMTP_SERVER";
/// Environment variable for the SMTP port.
const ENV_SMTP_PORT: &str = "EMAIL_SMTP_PORT";
/// Environment variable for the SMTP username (also the sender address).
const ENV_USERNAME: &str = "EMAIL_USERNAME";
/// Environment variable for the SMTP password.
const ENV_PASSWORD: &str = "EMAIL_PASSWORD";
/// Environment variable for the recipient address.
const ENV_TO: &str = "EMAIL_TO";

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP port that implies implicit TLS.
const SMTPS_PORT: u16 = 465;

/// Email channel configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port.
    pub smtp_port: u16,
    /// SMTP username, also used as the sender address.
    pub username: String,
    /// SMTP password (app password for most providers).
    pub password: String,
    /// Recipient email address.
    pub to: String,
    /// Sender display name.
    pub sender_name: String,
    /// Subject line prefix.
    pub subject_prefix: String,
    /// Body rendering switches.
    pub render: RenderOptions,
}

impl EmailConfig {
    /// Read the channel configuration from environment variables, taking
    /// presentation settings from `options`. Returns `None` when any
    /// required variable is absent.
    #[must_use]
    pub fn from_env(options: &NotifyOptions) -> Option<Self> {
        let smtp_host = std::env::var(ENV_SMTP_SERVER).ok()?;
        let username = std::env::var(ENV_USERNAME).ok()?;
        let password = std::env::var(ENV_PASSWORD).ok()?;
        let to = std::env::var(ENV_TO).ok()?;

        let smtp_port = std::env::var(ENV_SMTP_PORT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);

        Some(Self {
            smtp_host,
            smtp_port,
            username,
            password,
            to,
            sender_name: options.sender_name.clone(),
            subject_prefix: options.subject_prefix.clone(),
            render: options.render(),
        })
    }
}

/// Email notification channel.
pub struct EmailChannel {
    config: Option<EmailConfig>,
}

impl EmailChannel {
    /// Create the channel from environment variables.
    #[must_use]
    pub fn from_env(options: &NotifyOptions) -> Self {
        let config = EmailConfig::from_env(options);

        if config.is_some() {
            debug!("Email notifications enabled");
        } else {
            debug!("Email notifications disabled (EMAIL_* not fully set)");
        }

        Self { config }
    }

    /// Create the channel with an explicit configuration.
    #[must_use]
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// Build the SMTP transport for the configured host/port.
    fn mailer(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, ChannelError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let builder = if config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        };

        Ok(builder.port(config.smtp_port).credentials(creds).build())
    }

    /// Build and send a multipart (text + HTML) message.
    async fn deliver(
        config: &EmailConfig,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), ChannelError> {
        let from = Mailbox::new(Some(config.sender_name.clone()), config.username.parse()?);
        let to: Mailbox = config.to.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        let mailer = Self::mailer(config)?;
        mailer.send(email).await?;

        info!(to = %config.to, subject, "Email sent");
        Ok(())
    }

    /// Send a simple test email to verify configuration.
    pub async fn send_test(&self) -> Result<(), ChannelError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("EMAIL_*".to_string()))?;

        let subject = format!("{} Test email", config.subject_prefix);
        let text = "Email configuration is working.\n\n\
                    This is a test message; no repository changes were detected.\n"
            .to_string();
        let html = "<html><body>\
                    <h2>Email configuration is working.</h2>\
                    <p>This is a test message; no repository changes were detected.</p>\
                    </body></html>"
            .to_string();

        Self::deliver(config, &subject, text, html).await
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn send(&self, events: &[ChangeEvent]) -> Result<(), ChannelError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("EMAIL_*".to_string()))?;

        if events.is_empty() {
            debug!(channel = "email", "No events, nothing to send");
            return Ok(());
        }

        let now = Utc::now();
        let subject = content::subject(events, &config.subject_prefix);
        let text = content::render_text(events, &config.render, now);
        let html = content::render_html(events, &config.render, now);

        debug!(channel = "email", count = events.len(), "Sending summary email");
        Self::deliver(config, &subject, text, html).await
    }
}
