use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::countdown::{COUNTDOWN_START, FINAL_WORD};
use crate::orchestration::OrchestratorConfig;
use crate::sleeper::DEFAULT_SLEEP;
use crate::{slog_debug, Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pause taken by the default sleeper, in milliseconds.
    pub sleep_ms: u64,
    pub countdown_start: u32,
    pub final_word: String,
    pub checker: CheckerSettings,
    pub orchestrator: OrchestratorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerSettings {
    /// Simulated latency per check, in milliseconds.
    pub delay_ms: u64,
    pub schemes: Vec<String>,
    /// Regexes; a URL matching any of them fails the check.
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sleep_ms: DEFAULT_SLEEP.as_millis() as u64,
            countdown_start: COUNTDOWN_START,
            final_word: FINAL_WORD.to_string(),
            checker: CheckerSettings::default(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            schemes: vec!["http".to_string(), "https".to_string()],
            deny: Vec::new(),
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".sitecheck"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("sitecheck.toml"))
    }

    pub fn sleep_duration(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            timeout: self.orchestrator.timeout_ms.map(Duration::from_millis),
            max_concurrent: self.orchestrator.max_concurrent,
        }
    }

    /// Load the config from the default location, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        slog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            slog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        slog_debug!(
            "Config loaded: sleep_ms={}, deny={:?}, timeout_ms={:?}",
            config.sleep_ms,
            config.checker.deny,
            config.orchestrator.timeout_ms
        );
        Ok(config)
    }

    /// Load from an explicit path (with `~/` expansion) or the default location.
    pub fn load_optional(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(&expand_tilde(p)),
            None => Self::load(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                slog_debug!("Creating config directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_toml()?)?;
        slog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings that would make a run hang or check nothing.
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_concurrent == Some(0) {
            return Err(Error::Validation(
                "orchestrator.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.checker.schemes.is_empty() {
            return Err(Error::Validation(
                "checker.schemes must name at least one scheme".to_string(),
            ));
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
