use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::store::DEFAULT_FETCH_TIMEOUT;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub default: Option<Profile>,
    pub profiles: Option<HashMap<String, Profile>>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Profile {
    pub connection: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub listen_addr: Option<String>,
    pub static_dir: Option<String>,
}

impl Profile {
    /// Merge another profile into this one (other takes priority for set fields).
    pub fn merge(&mut self, other: &Profile) {
        if other.connection.is_some() {
            self.connection = other.connection.clone();
        }
        if other.fetch_timeout_secs.is_some() {
            self.fetch_timeout_secs = other.fetch_timeout_secs;
        }
        if other.listen_addr.is_some() {
            self.listen_addr = other.listen_addr.clone();
        }
        if other.static_dir.is_some() {
            self.static_dir = other.static_dir.clone();
        }
    }

    fn merge_file(&mut self, cfg: &ConfigFile, profile_name: &str) {
        if let Some(default) = &cfg.default {
            self.merge(default);
        }
        if profile_name != "default" {
            if let Some(named) = cfg.profiles.as_ref().and_then(|p| p.get(profile_name)) {
                self.merge(named);
            }
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    /// Connection string: `--db` flag, then the environment, then the profile.
    pub fn resolve_connection(&self, db_override: Option<&str>) -> Result<String, ConfigError> {
        self.resolve_connection_with(db_override, |key| std::env::var(key).ok())
    }

    pub fn resolve_connection_with(
        &self,
        db_override: Option<&str>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        if let Some(db) = db_override {
            return Ok(db.to_string());
        }
        if let Some(conn) = connection_from_env(var) {
            return Ok(conn);
        }
        self.connection.clone().ok_or(ConfigError::MissingConnection)
    }
}

/// Build a connection string from `DATABASE_URL`, or from the discrete
/// `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASSWORD` variables.
pub fn connection_from_env(var: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(url) = var("DATABASE_URL").filter(|u| !u.is_empty()) {
        return Some(url);
    }

    let host = var("DB_HOST")?;
    let mut parts = vec![format!("host={}", quote_value(&host))];
    parts.push(format!(
        "port={}",
        var("DB_PORT").unwrap_or_else(|| "5432".to_string())
    ));
    let optional = [
        ("DB_NAME", "dbname"),
        ("DB_USER", "user"),
        ("DB_PASSWORD", "password"),
    ];
    for (env_key, pg_key) in optional {
        if let Some(value) = var(env_key) {
            parts.push(format!("{pg_key}={}", quote_value(&value)));
        }
    }
    Some(parts.join(" "))
}

fn quote_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Walk up from the current directory looking for `.growthlog/config.toml`.
pub fn find_project_config() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(".growthlog").join("config.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Global config path: `~/.config/growthlog/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("growthlog").join("config.toml"))
}

pub fn load_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Resolve a profile by name, merging global defaults → project defaults → named profile.
pub fn load_config(profile_name: &str) -> Result<Profile, ConfigError> {
    let paths = [global_config_path(), find_project_config()];
    load_layers(paths.iter().flatten(), profile_name)
}

fn load_layers<'a>(
    paths: impl Iterator<Item = &'a PathBuf>,
    profile_name: &str,
) -> Result<Profile, ConfigError> {
    let mut result = Profile::default();
    for path in paths {
        if !path.is_file() {
            continue;
        }
        let cfg = load_file(path)?;
        result.merge_file(&cfg, profile_name);
    }
    Ok(result)
}
