//! Daemon configuration from environment variables (`.env` honoured)

use anyhow::{bail, Context, Result};
use queuebot_api_rpc::RpcServerConfig;
use queuebot_core::application::constants::DEFAULT_MAX_CHUNK_CHARS;
use queuebot_core::application::StoreConfig;
use queuebot_core::domain::ServerId;
use queuebot_infra_discord::{DiscordConfig, DEFAULT_API_BASE, DEFAULT_STORAGE_CHANNEL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug)]
pub struct DaemonConfig {
    pub discord: DiscordConfig,
    pub store: StoreConfig,
    pub rpc: RpcServerConfig,
    /// Servers whose stores are loaded at startup
    pub guilds: Vec<ServerId>,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    /// Read the process environment, after loading `.env` if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = var("QUEUEBOT_TOKEN").context("QUEUEBOT_TOKEN is required")?;

        let timeout_secs = parse_or(&var, "QUEUEBOT_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let discord = DiscordConfig::new(token)
            .with_api_base(var("QUEUEBOT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()))
            .with_storage_channel(
                var("QUEUEBOT_STORAGE_CHANNEL")
                    .unwrap_or_else(|| DEFAULT_STORAGE_CHANNEL.to_string()),
            )
            .with_http_timeout(Duration::from_secs(timeout_secs));

        let store = StoreConfig::default().with_max_chunk_chars(parse_or(
            &var,
            "QUEUEBOT_MAX_CARRIER_CHARS",
            DEFAULT_MAX_CHUNK_CHARS,
        )?);
        store
            .validate()
            .context("QUEUEBOT_MAX_CARRIER_CHARS is out of range")?;

        let defaults = RpcServerConfig::default();
        let rpc = RpcServerConfig {
            host: var("QUEUEBOT_RPC_HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "QUEUEBOT_RPC_PORT", defaults.port)?,
            rate_limit_burst: parse_or(&var, "QUEUEBOT_RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
            rate_limit_rate: parse_or(&var, "QUEUEBOT_RATE_LIMIT_RATE", defaults.rate_limit_rate)?,
        };

        let guilds = match var("QUEUEBOT_GUILDS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<ServerId>()
                        .with_context(|| format!("QUEUEBOT_GUILDS: invalid server id {:?}", s))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let log_format = match var("QUEUEBOT_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("QUEUEBOT_LOG_FORMAT must be pretty or json, got {:?}", other),
        };

        Ok(Self {
            discord,
            store,
            rpc,
            guilds,
            log_format,
            log_dir: var("QUEUEBOT_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{}: invalid value {:?}", name, raw)),
        None => Ok(default),
    }
}
