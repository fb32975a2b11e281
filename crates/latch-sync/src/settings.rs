use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;
pub const MAX_TRASH_RETENTION_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Status/transfer rounds one sync cycle may take before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_trash_retention_days")]
    pub trash_retention_days: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            trash_retention_days: default_trash_retention_days(),
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_trash_retention_days() -> i64 {
    DEFAULT_TRASH_RETENTION_DAYS
}

impl SyncSettings {
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Overrides fields from `LATCH_SYNC_MAX_ATTEMPTS` and
    /// `LATCH_TRASH_RETENTION_DAYS`; invalid values are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var("LATCH_SYNC_MAX_ATTEMPTS") {
            match value.parse::<u32>() {
                Ok(parsed) if parsed > 0 => self.max_attempts = parsed,
                _ => warn!(event = "config_invalid", field = "LATCH_SYNC_MAX_ATTEMPTS", value = %value),
            }
        }
        if let Ok(value) = env::var("LATCH_TRASH_RETENTION_DAYS") {
            match value.parse::<i64>() {
                Ok(parsed) if (0..=MAX_TRASH_RETENTION_DAYS).contains(&parsed) => {
                    self.trash_retention_days = parsed;
                }
                _ => warn!(event = "config_invalid", field = "LATCH_TRASH_RETENTION_DAYS", value = %value),
            }
        }
    }

    /// Retention as a duration, clamped to `0..=MAX_TRASH_RETENTION_DAYS`
    /// so a hand-edited config cannot overflow the purge cutoff.
    #[must_use]
    pub fn trash_retention(&self) -> chrono::Duration {
        chrono::Duration::days(
            self.trash_retention_days
                .clamp(0, MAX_TRASH_RETENTION_DAYS),
        )
    }
}
