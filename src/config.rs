use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_LINEAR_URL: &str = "https://api.linear.app/graphql";
pub const DEFAULT_NOTION_URL: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_WINDOW_HOURS: i64 = 5;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Linear rejects `first` above this.
pub const MAX_PAGE_SIZE: u32 = 250;
/// Runs a failing issue may hold the watermark back before it is skipped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub linear: LinearConfig,
    pub notion: NotionConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LinearConfig {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: Option<String>,
    pub database_id: Option<String>,
    pub api_url: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    pub window_hours: Option<i64>,
    pub page_size: Option<u32>,
    pub state_file: Option<PathBuf>,
    pub max_attempts: Option<u32>,
}

/// Validated credentials, ready to build providers from.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub linear_api_key: String,
    pub notion_api_key: String,
    pub notion_database_id: String,
}

impl AppConfig {
    /// Overlay environment variables. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("LINEAR_API_KEY") {
            self.linear.api_key = Some(v);
        }
        if let Some(v) = non_empty("NOTION_API_KEY") {
            self.notion.api_key = Some(v);
        }
        if let Some(v) = non_empty("NOTION_DB_ID") {
            self.notion.database_id = Some(v);
        }
    }

    pub fn credentials(&self) -> Result<Credentials> {
        fn required(value: &Option<String>, var: &str) -> Result<String> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => bail!("{var} is not set (environment or config file)"),
            }
        }
        Ok(Credentials {
            linear_api_key: required(&self.linear.api_key, "LINEAR_API_KEY")?,
            notion_api_key: required(&self.notion.api_key, "NOTION_API_KEY")?,
            notion_database_id: required(&self.notion.database_id, "NOTION_DB_ID")?,
        })
    }

    pub fn linear_url(&self) -> &str {
        self.linear.api_url.as_deref().unwrap_or(DEFAULT_LINEAR_URL)
    }

    pub fn notion_url(&self) -> &str {
        self.notion.api_url.as_deref().unwrap_or(DEFAULT_NOTION_URL)
    }

    pub fn notion_version(&self) -> &str {
        self.notion.version.as_deref().unwrap_or(DEFAULT_NOTION_VERSION)
    }

    pub fn window_hours(&self) -> i64 {
        self.sync.window_hours.unwrap_or(DEFAULT_WINDOW_HOURS)
    }

    pub fn page_size(&self) -> u32 {
        self.sync
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn max_attempts(&self) -> u32 {
        self.sync.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1)
    }

    pub fn state_file(&self) -> PathBuf {
        self.sync
            .state_file
            .clone()
            .unwrap_or_else(|| data_dir().join("state.json"))
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".linear-notion-sync")
}

fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

/// Load the TOML config. An explicitly given path must exist; the default
/// location is optional.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path(), false),
    };
    if !path.exists() {
        if explicit {
            bail!("Config file {} does not exist", path.display());
        }
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    Ok(toml::from_str(contents)?)
}
