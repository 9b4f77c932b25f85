//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable values fall back
//! to the defaults listed on each field.

use std::net::SocketAddr;
use std::time::Duration;

use crate::domain::Credentials;
use crate::ws::SessionSettings;

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (default `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Bootstrap username (default `percy`).
    pub login_username: String,

    /// Bootstrap password (default `123`).
    pub login_password: String,

    /// Lifetime of a one-time admission token (default 5 s).
    pub token_ttl: Duration,

    /// Period of the token retention sweep (default 60 s).
    pub token_sweep_interval: Duration,

    /// Read deadline without a heartbeat response (default 10 s).
    pub pong_wait: Duration,

    /// Maximum inbound frame size in bytes (default 512).
    pub max_frame_bytes: usize,

    /// Bound of each session's egress queue (default 256).
    pub egress_capacity: usize,

    /// Browser origins allowed to open `/ws` (default `https://localhost:3000`).
    /// Empty allows every origin.
    pub allowed_origins: Vec<String>,

    /// Log output format (default text).
    pub log_format: LogFormat,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let login_username = std::env::var("LOGIN_USERNAME").unwrap_or_else(|_| "percy".to_string());
        let login_password = std::env::var("LOGIN_PASSWORD").unwrap_or_else(|_| "123".to_string());

        let token_ttl = Duration::from_secs(parse_env("TOKEN_TTL_SECS", 5));
        let token_sweep_interval =
            Duration::from_secs(parse_env::<u64>("TOKEN_SWEEP_INTERVAL_SECS", 60).max(1));
        let pong_wait = Duration::from_secs(parse_env::<u64>("PONG_WAIT_SECS", 10).max(1));
        let max_frame_bytes = parse_env("MAX_FRAME_BYTES", 512);
        let egress_capacity = parse_env::<usize>("EGRESS_CAPACITY", 256).max(1);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_else(|_| vec!["https://localhost:3000".to_string()]);

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            login_username,
            login_password,
            token_ttl,
            token_sweep_interval,
            pong_wait,
            max_frame_bytes,
            egress_capacity,
            allowed_origins,
            log_format,
        })
    }

    /// Per-session timing and sizing derived from this configuration.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            pong_wait: self.pong_wait,
            max_frame_bytes: self.max_frame_bytes,
            egress_capacity: self.egress_capacity,
        }
    }

    /// The bootstrap credential pair.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.login_username, &self.login_password)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Splits a comma-separated origin list, trimming blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
