// Runtime configuration, read from the environment after `.env` is loaded.

use anyhow::{anyhow, bail, Context};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: Option<String>,
    pub jwt_ttl_hours: i64,
    pub lexicon_file: Option<PathBuf>,
    pub staff_role: String,
    pub heartbeat: Duration,
    pub channel_buffer: usize,
    pub client: ClientConfig,
}

/// Settings for the `watch` client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub desk_url: String,
    pub token: Option<String>,
    /// Re-read whenever the server refuses the current token.
    pub token_file: Option<PathBuf>,
    pub reconnect_delay: Duration,
    pub request_timeout: Duration,
    pub max_rate_limit_retries: u32,
    pub alerts: bool,
}

impl ClientConfig {
    /// Current client token: the token file wins over DESK_TOKEN.
    pub fn read_token(&self) -> anyhow::Result<String> {
        if let Some(path) = &self.token_file {
            let token = std::fs::read_to_string(path)
                .with_context(|| format!("reading token file {}", path.display()))?;
            return Ok(token.trim().to_string());
        }
        self.token
            .clone()
            .ok_or_else(|| anyhow!("DESK_TOKEN or DESK_TOKEN_FILE must be set"))
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://data/comments.db?mode=rwc".to_string()),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            jwt_secret: get("JWT_SECRET"),
            jwt_ttl_hours: parse(&get, "JWT_TTL_HOURS", 24)?,
            lexicon_file: get("LEXICON_FILE").map(PathBuf::from),
            staff_role: get("STAFF_ROLE").unwrap_or_else(|| "moderator".to_string()),
            heartbeat: seconds(&get, "HEARTBEAT_SECS", 30)?,
            channel_buffer: parse(&get, "CHANNEL_BUFFER", 64)?,
            client: ClientConfig {
                desk_url: get("DESK_URL").unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
                token: get("DESK_TOKEN"),
                token_file: get("DESK_TOKEN_FILE").map(PathBuf::from),
                reconnect_delay: seconds(&get, "RECONNECT_DELAY_SECS", 5)?,
                request_timeout: seconds(&get, "REQUEST_TIMEOUT_SECS", 10)?,
                max_rate_limit_retries: parse(&get, "MAX_RATE_LIMIT_RETRIES", 3)?,
                alerts: parse(&get, "DESK_ALERTS", false)?,
            },
        })
    }

    pub fn jwt_secret(&self) -> anyhow::Result<&str> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow!("JWT_SECRET must be set"))
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        None => Ok(default),
    }
}

/// A whole number of seconds, at least one.
fn seconds(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> anyhow::Result<Duration> {
    match parse(get, key, default)? {
        0 => bail!("{key} must be at least 1 second"),
        secs => Ok(Duration::from_secs(secs)),
    }
}
