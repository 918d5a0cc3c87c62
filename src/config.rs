use anyhow::{Context, Result};
use cloudkit::{DEFAULT_PAGE_SIZE, RetryConfig};
use declarative::RecreatePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("cirrus"))
}

/// Path of the host settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

// ============================================================================
// Settings
// ============================================================================

/// Host settings from `~/.config/cirrus/config.toml`
///
/// Every field is optional; a missing file means all defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Emulator backend store
    pub state_file: String,
    /// Resource groups converged in parallel
    pub jobs: usize,
    /// Resource groups per listing page
    pub page_size: usize,
    pub recreate: RecreatePolicy,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_file: "~/.local/state/cirrus/cloud.json".to_string(),
            jobs: 4,
            page_size: DEFAULT_PAGE_SIZE,
            recreate: RecreatePolicy::default(),
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: u64::try_from(defaults.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: defaults.backoff_factor,
            max_delay_ms: u64::try_from(defaults.max_delay.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl RetrySettings {
    pub fn to_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl Settings {
    /// Load the settings file, or defaults when it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Emulator store, with `override_path` (flag or `CIRRUS_STATE`) winning
    pub fn state_path(&self, override_path: Option<&Path>) -> PathBuf {
        match override_path {
            Some(path) => expand_path(&path.to_string_lossy()),
            None => expand_path(&self.state_file),
        }
    }

    /// Worker count, with a command-line value winning; never zero
    pub fn jobs(&self, flag: Option<usize>) -> usize {
        flag.unwrap_or(self.jobs).max(1)
    }
}

// ============================================================================
// Tests
// ============================================================================
