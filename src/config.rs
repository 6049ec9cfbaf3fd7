use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ROOM: &str = "general";
const DEFAULT_RECONNECT_MS: u64 = 500;
const DEFAULT_RECONNECT_MAX_MS: u64 = 30_000;
const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 30_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number of milliseconds, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// WebSocket endpoint. `None` runs against an in-process room.
    pub server_url: Option<String>,
    pub room_id: String,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    /// `None` waits for the backend indefinitely.
    pub submit_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: None,
            room_id: DEFAULT_ROOM.to_string(),
            email: None,
            user_id: None,
            reconnect_initial: Duration::from_millis(DEFAULT_RECONNECT_MS),
            reconnect_max: Duration::from_millis(DEFAULT_RECONNECT_MAX_MS),
            submit_timeout: Some(Duration::from_millis(DEFAULT_SUBMIT_TIMEOUT_MS)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let millis = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match var(name) {
                Some(value) => value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber { name, value }),
                None => Ok(default),
            }
        };

        let submit_timeout = millis("ROOM_CHAT_SUBMIT_TIMEOUT_MS", DEFAULT_SUBMIT_TIMEOUT_MS)?;

        Ok(Config {
            server_url: var("ROOM_CHAT_URL"),
            room_id: var("ROOM_CHAT_ROOM").unwrap_or_else(|| DEFAULT_ROOM.to_string()),
            email: var("ROOM_CHAT_EMAIL"),
            user_id: var("ROOM_CHAT_USER_ID"),
            reconnect_initial: Duration::from_millis(millis(
                "ROOM_CHAT_RECONNECT_MS",
                DEFAULT_RECONNECT_MS,
            )?),
            reconnect_max: Duration::from_millis(millis(
                "ROOM_CHAT_RECONNECT_MAX_MS",
                DEFAULT_RECONNECT_MAX_MS,
            )?),
            submit_timeout: (submit_timeout > 0).then(|| Duration::from_millis(submit_timeout)),
        })
    }
}
