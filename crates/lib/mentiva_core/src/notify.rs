// @zen-component: ENT-NotificationPort
//
//! Notification seam — expiry notices.
//!
//! The gate fires these best-effort after a downgrade; a mailer outage must
//! never affect the access decision, so errors here are logged by the caller
//! and go nowhere else.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::config::MailerConfig;

/// Errors from sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Mailer request failed: {0}")]
    Transport(String),

    #[error("Mailer returned {0}")]
    Status(u16),

    #[error("Mailer not configured: {0}")]
    Config(String),
}

/// Seam for user-facing notifications.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// Tell a user their subscription period lapsed and access was paused.
    async fn send_expiry_notice(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

/// Transactional-mail API notifier.
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailerConfig,
}

impl HttpMailer {
    pub fn new(config: MailerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationPort for HttpMailer {
    async fn send_expiry_notice(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<(), NotifyError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| NotifyError::Config("MAILER_API_KEY is not set".into()))?;

        let greeting = display_name.unwrap_or("there");
        let body = MailRequest {
            from: &self.config.from_address,
            to: [email],
            subject: "Your Mentiva access has been paused",
            text: format!(
                "Hi {greeting},\n\n\
                 Your current payment period has ended, so access to the \
                 course platform is paused until the next installment is \
                 received. Reply to this email if you think this is a \
                 mistake.\n\n— The Mentiva team"
            ),
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }

        info!(email, "expiry notice sent");
        Ok(())
    }
}

/// No-op notifier for deployments without a mail key; only logs.
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn send_expiry_notice(
        &self,
        email: &str,
        _display_name: Option<&str>,
    ) -> Result<(), NotifyError> {
        info!(email, "expiry notice suppressed (no mailer configured)");
        Ok(())
    }
}
