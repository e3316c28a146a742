//! Daemon configuration.
//!
//! Loaded with figment from (highest precedence first):
//! 1. Environment variables prefixed with `SCHOOLD_`, `__` separating sections
//!    (`SCHOOLD_DATABASE__PATH`)
//! 2. A TOML file named by `SCHOOLD_CONFIG`, or `./schoold.toml`
//! 3. Defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_NAME: &str = "schoold.toml";
const CONFIG_PATH_ENV: &str = "SCHOOLD_CONFIG";
const ENV_PREFIX: &str = "SCHOOLD_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(Box<figment::Error>),

    #[error("invalid configuration: {message}")]
    Validation { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub uploads: UploadConfig,
    pub pages: PagesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file. `None` runs the daemon without a database until
    /// `workspace.select` attaches one.
    pub path: Option<PathBuf>,
    /// Attempts per read query on `SQLITE_BUSY`/`SQLITE_LOCKED`.
    pub retry_attempts: u32,
    /// Fixed delay between read attempts.
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest decoded upload accepted by any form.
    pub max_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub page_size: u32,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub home_notice_count: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            retry_attempts: 3,
            retry_delay_ms: 50,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_minutes: 240 }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            cache_ttl_secs: 300,
            cache_max_entries: 256,
            home_notice_count: 6,
        }
    }
}

impl Config {
    /// Load from defaults, the config file, and the environment.
    ///
    /// Never fails: every problem found is returned next to a usable config.
    /// Out-of-range fields fall back to their defaults one by one, and an
    /// unreadable source still keeps `database.path` when it can be read.
    pub fn load() -> (Self, Vec<ConfigError>) {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        Self::load_from(Figment::new().merge(Toml::file(path)))
    }

    /// Layer `overrides` between the defaults and the environment.
    pub fn load_from(overrides: Figment) -> (Self, Vec<ConfigError>) {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(overrides)
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        match figment.extract::<Config>() {
            Ok(mut config) => {
                let problems = config.repair();
                (config, problems)
            }
            Err(e) => {
                let mut config = Config::default();
                config.database.path = figment.extract_inner::<PathBuf>("database.path").ok();
                (config, vec![ConfigError::from(e)])
            }
        }
    }

    /// Reset every out-of-range field to its default.
    pub fn repair(&mut self) -> Vec<ConfigError> {
        let mut problems = Vec::new();
        let mut reset = |message: String| problems.push(ConfigError::Validation { message });

        if self.database.retry_attempts == 0 {
            self.database.retry_attempts = DatabaseConfig::default().retry_attempts;
            reset("database.retry_attempts must be at least 1".to_string());
        }
        if self.session.ttl_minutes == 0 {
            self.session.ttl_minutes = SessionConfig::default().ttl_minutes;
            reset("session.ttl_minutes must be at least 1".to_string());
        }
        if self.uploads.max_bytes == 0 {
            self.uploads.max_bytes = UploadConfig::default().max_bytes;
            reset("uploads.max_bytes must be at least 1".to_string());
        }
        if !(1..=100).contains(&self.pages.page_size) {
            reset(format!(
                "pages.page_size must be between 1 and 100, got {}",
                self.pages.page_size
            ));
            self.pages.page_size = PagesConfig::default().page_size;
        }
        problems
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.database.retry_delay_ms)
    }

    #[must_use]
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.session.ttl_minutes))
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.pages.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_toml(toml: &str) -> (Config, Vec<ConfigError>) {
        Config::load_from(Figment::new().merge(Toml::string(toml)))
    }

    #[test]
    fn defaults_run_without_a_database() {
        let mut config = Config::default();
        assert!(config.database.path.is_none());
        assert_eq!(config.database.retry_attempts, 3);
        assert_eq!(config.pages.page_size, 10);
        assert!(config.repair().is_empty());
    }

    #[test]
    fn toml_overrides_defaults() {
        let toml = r#"
            [database]
            path = "/tmp/site.sqlite3"
            retry_attempts = 5

            [pages]
            page_size = 20
        "#;
        let (config, problems) = load_toml(toml);
        assert!(problems.is_empty());
        assert_eq!(
            config.database.path.as_deref(),
            Some(std::path::Path::new("/tmp/site.sqlite3"))
        );
        assert_eq!(config.database.retry_attempts, 5);
        assert_eq!(config.database.retry_delay_ms, 50);
        assert_eq!(config.pages.page_size, 20);
    }

    #[test]
    fn zero_retry_attempts_fall_back_to_the_default() {
        let mut config = Config::default();
        config.database.retry_attempts = 0;
        let problems = config.repair();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].to_string().contains("retry_attempts"));
        assert_eq!(config.database.retry_attempts, 3);
    }

    #[test]
    fn a_bad_page_size_keeps_the_database_path() {
        let toml = r#"
            [database]
            path = "/srv/school/site.sqlite3"

            [pages]
            page_size = 500
            home_notice_count = 4
        "#;
        let (config, problems) = load_toml(toml);
        assert_eq!(problems.len(), 1);
        assert!(matches!(problems[0], ConfigError::Validation { .. }));
        assert_eq!(config.pages.page_size, 10);
        assert_eq!(config.pages.home_notice_count, 4);
        assert_eq!(
            config.database.path.as_deref(),
            Some(std::path::Path::new("/srv/school/site.sqlite3"))
        );
    }

    #[test]
    fn an_unreadable_section_still_keeps_the_database_path() {
        let toml = r#"
            [database]
            path = "/srv/school/site.sqlite3"

            [session]
            ttl_minutes = "forever"
        "#;
        let (config, problems) = load_toml(toml);
        assert!(matches!(problems.as_slice(), [ConfigError::Load(_)]));
        assert_eq!(config.session.ttl_minutes, 240);
        assert_eq!(
            config.database.path.as_deref(),
            Some(std::path::Path::new("/srv/school/site.sqlite3"))
        );
    }
}
