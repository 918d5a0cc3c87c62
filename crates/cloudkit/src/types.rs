//! Core types for cloud backends.

use chrono::{DateTime, Utc};
use declarative::Configuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// A resource as the emulator stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    /// Observed configuration, fully populated
    pub resource: Configuration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredResource {
    pub fn new(resource: Configuration) -> Self {
        let now = Utc::now();
        Self {
            resource,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the configuration and bump `updated_at`
    pub fn touch(&mut self, resource: Configuration) {
        self.resource = resource;
        self.updated_at = Utc::now();
    }
}

/// Everything the emulator knows, as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudState {
    /// Resources by storage key (`kind/group/name`, lowercased)
    #[serde(default)]
    pub resources: BTreeMap<String, StoredResource>,
    /// Last time the state was written
    pub last_updated: DateTime<Utc>,
}

impl Default for CloudState {
    fn default() -> Self {
        Self {
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceGroupConfig;

    #[test]
    fn test_retry_delay_calculation() {
        let config = RetryConfig::new(5, Duration::from_millis(500), 2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        // Capped at max_delay
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(10));
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = CloudState::default();
        state.resources.insert(
            "resource_group/rg".into(),
            StoredResource::new(ResourceGroupConfig::new("rg").with_region("East US").into()),
        );

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"kind\":\"resource_group\""));
        let back: CloudState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.resources.len(), 1);
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut stored = StoredResource::new(ResourceGroupConfig::new("rg").into());
        let created = stored.created_at;
        stored.touch(ResourceGroupConfig::new("rg").with_region("West US").into());
        assert!(stored.updated_at >= created);
        assert_eq!(stored.created_at, created);
    }
}
