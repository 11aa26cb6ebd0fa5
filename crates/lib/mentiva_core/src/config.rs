//! Environment-driven configuration for the guild client and the mailer.

use std::time::Duration;

/// Default Discord REST endpoint.
const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Default per-request timeout for guild API calls.
const DEFAULT_GUILD_HTTP_TIMEOUT_SECS: u64 = 5;

/// Configuration for [`crate::guild::client::GuildClient`].
#[derive(Clone, Debug)]
pub struct GuildConfig {
    /// Base URL of the Discord REST API.
    pub api_base_url: String,
    /// Snowflake ID of the community guild.
    pub guild_id: String,
    /// Bot token used for the `Authorization: Bot <token>` header.
    pub bot_token: String,
    /// Per-request timeout. A timed-out call is treated like any other
    /// failed call; no retry happens inside the client.
    pub http_timeout: Duration,
}

impl GuildConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                          |
    /// |---------------------------|----------------------------------|
    /// | `DISCORD_API_BASE_URL`    | `https://discord.com/api/v10`    |
    /// | `DISCORD_GUILD_ID`        | empty (guild calls will 404)     |
    /// | `DISCORD_BOT_TOKEN`       | empty (guild calls will 401)     |
    /// | `GUILD_HTTP_TIMEOUT_SECS` | `5`                              |
    pub fn from_env() -> Self {
        let timeout_secs = std::env::var("GUILD_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_GUILD_HTTP_TIMEOUT_SECS);
        Self {
            api_base_url: std::env::var("DISCORD_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DISCORD_API_BASE.into()),
            guild_id: std::env::var("DISCORD_GUILD_ID").unwrap_or_default(),
            bot_token: std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default(),
            http_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Configuration for [`crate::notify::HttpMailer`].
#[derive(Clone, Debug)]
pub struct MailerConfig {
    /// Transactional-mail API endpoint.
    pub api_url: String,
    /// API key. `None` disables the HTTP mailer; use
    /// [`crate::notify::LogNotifier`] instead.
    pub api_key: Option<String>,
    /// From address for expiry notices.
    pub from_address: String,
}

impl MailerConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable         | Default                              |
    /// |------------------|--------------------------------------|
    /// | `MAILER_API_URL` | `https://api.resend.com/emails`      |
    /// | `MAILER_API_KEY` | unset                                |
    /// | `MAILER_FROM`    | `Mentiva <no-reply@mentiva.app>`     |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("MAILER_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".into()),
            api_key: std::env::var("MAILER_API_KEY").ok(),
            from_address: std::env::var("MAILER_FROM")
                .unwrap_or_else(|_| "Mentiva <no-reply@mentiva.app>".into()),
        }
    }
}
