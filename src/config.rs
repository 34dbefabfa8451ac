//! Configuration loader and validator for the Trello↔Notion synchronizer.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Bounds for the board polling interval, in seconds.
pub const MIN_POLL_INTERVAL_SECONDS: u64 = 30;
pub const MAX_POLL_INTERVAL_SECONDS: u64 = 900;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub trello: Trello,
    pub notion: Notion,
}

/// App-level timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub poll_interval_seconds: u64,
    pub retry_delay_seconds: u64,
}

/// Trello API credentials and target board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trello {
    pub key: String,
    pub token: String,
    pub board_id: String,
}

/// Notion API settings and target database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notion {
    pub token: String,
    pub version: String,
    pub database_id: String,
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance. Out-of-range intervals are rejected
/// rather than silently clamped.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.poll_interval_seconds < MIN_POLL_INTERVAL_SECONDS {
        return Err(ConfigError::Invalid(
            "app.poll_interval_seconds must be at least 30",
        ));
    }
    if cfg.app.poll_interval_seconds > MAX_POLL_INTERVAL_SECONDS {
        return Err(ConfigError::Invalid(
            "app.poll_interval_seconds must be at most 900",
        ));
    }
    if cfg.app.retry_delay_seconds == 0 {
        return Err(ConfigError::Invalid("app.retry_delay_seconds must be > 0"));
    }

    if cfg.trello.key.trim().is_empty() {
        return Err(ConfigError::Invalid("trello.key must be non-empty"));
    }
    if cfg.trello.token.trim().is_empty() {
        return Err(ConfigError::Invalid("trello.token must be non-empty"));
    }
    if cfg.trello.board_id.trim().is_empty() {
        return Err(ConfigError::Invalid("trello.board_id must be non-empty"));
    }

    if cfg.notion.token.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.token must be non-empty"));
    }
    if cfg.notion.version.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.version must be non-empty"));
    }
    if cfg.notion.database_id.trim().is_empty() {
        return Err(ConfigError::Invalid("notion.database_id must be non-empty"));
    }

    Ok(())
}

/// Example YAML configuration, used by docs and tests.
pub fn example() -> &'static str {
    r#"app:
  poll_interval_seconds: 60
  retry_delay_seconds: 30

trello:
  key: "YOUR_TRELLO_API_KEY"
  token: "YOUR_TRELLO_API_TOKEN"
  board_id: "YOUR_TRELLO_BOARD_ID"

notion:
  token: "YOUR_NOTION_INTEGRATION_TOKEN"
  version: "2022-06-28"
  database_id: "YOUR_NOTION_DATABASE_ID"
"#
}
