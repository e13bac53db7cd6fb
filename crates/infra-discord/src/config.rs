// Discord adapter configuration

use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_STORAGE_CHANNEL: &str = "queue-storage";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Rate limits with a longer retry-after are surfaced instead of waited out
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct DiscordConfig {
    /// Bot token (sent as `Authorization: Bot <token>`)
    pub token: String,
    pub api_base: String,
    /// Name of the hidden per-server storage channel
    pub storage_channel: String,
    pub http_timeout: Duration,
}

impl DiscordConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            storage_channel: DEFAULT_STORAGE_CHANNEL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_storage_channel(mut self, name: impl Into<String>) -> Self {
        self.storage_channel = name.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("storage_channel", &self.storage_channel)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
