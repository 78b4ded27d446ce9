//! Workspace settings (cogkit.toml + COGKIT_* env overrides).

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::CogError;

/// Events processed per second by the reactroles queue worker.
pub const DEFAULT_MAX_PROCESSED_PER_SECOND: u32 = 5;
/// Longest accepted reminder: two years.
pub const DEFAULT_MAX_REMINDER_SECS: u64 = 2 * 31_540_000;

/// Top-level settings for the cog library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CogkitSettings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub reactroles: ReactRolesSettings,
    #[serde(default)]
    pub reminder: ReminderSettings,
}

impl Default for CogkitSettings {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            reactroles: ReactRolesSettings::default(),
            reminder: ReminderSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactRolesSettings {
    /// Successful role edits per second. `0` disables the pacing pause
    /// entirely; it is a fixed-rate throttle, not adaptive backoff.
    #[serde(default = "default_max_processed")]
    pub max_processed_per_second: u32,
}

impl Default for ReactRolesSettings {
    fn default() -> Self {
        Self {
            max_processed_per_second: default_max_processed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    #[serde(default = "default_max_reminder_secs")]
    pub max_duration_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_reminder_secs(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.cogkit/cogkit.db")
}

fn default_max_processed() -> u32 {
    DEFAULT_MAX_PROCESSED_PER_SECOND
}

fn default_max_reminder_secs() -> u64 {
    DEFAULT_MAX_REMINDER_SECS
}

impl CogkitSettings {
    /// Load settings from a TOML file with COGKIT_* env var overrides.
    /// A missing file yields the defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, CogError> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COGKIT_").split("_"))
            .extract()
            .map_err(|e| CogError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.cogkit/cogkit.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = CogkitSettings::default();
        assert_eq!(settings.reactroles.max_processed_per_second, 5);
        assert_eq!(settings.reminder.max_duration_secs, 63_080_000);
        assert!(settings.database.path.ends_with("cogkit.db"));
    }
}
