//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use wr_core::{DqMode, NameMode, RaceTime, ReconcileConfig, RetryPolicy};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the `E*.scb` start lists.
    pub start_list_dir: PathBuf,

    /// Directory the timing console writes result files to.
    pub results_dir: PathBuf,

    /// Lanes in the pool, 6-10.
    pub lane_count: u8,

    /// Watches that must agree before a time is shown.
    pub min_times: usize,

    /// Largest allowed distance of a watch from the final time. Either a
    /// time string (`"0.30"`) or a number of seconds (`0.3`).
    pub time_threshold: RaceTime,

    pub dq_mode: DqMode,

    pub name_mode: NameMode,

    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let reconcile = ReconcileConfig::default();
        let retry = RetryPolicy::default();
        Self {
            start_list_dir: PathBuf::from("."),
            results_dir: PathBuf::from("."),
            lane_count: reconcile.lane_count,
            min_times: reconcile.min_times,
            time_threshold: reconcile.time_threshold,
            dq_mode: reconcile.dq_mode,
            name_mode: NameMode::default(),
            retry_max_attempts: retry.max_attempts,
            retry_base_delay_ms: duration_ms(retry.base_delay),
            retry_max_delay_ms: duration_ms(retry.max_delay),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WAHOO_*)
        figment = figment.merge(Env::prefixed("WAHOO_"));

        figment.extract()
    }

    /// Checks the values the file format alone can't rule out.
    pub fn validate(&self) -> Result<()> {
        self.reconcile_config().validate()?;
        ensure!(
            self.retry_max_attempts >= 1,
            "retry_max_attempts must be at least 1"
        );
        ensure!(
            self.retry_base_delay_ms <= self.retry_max_delay_ms,
            "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
            self.retry_base_delay_ms,
            self.retry_max_delay_ms
        );
        Ok(())
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            lane_count: self.lane_count,
            min_times: self.min_times,
            time_threshold: self.time_threshold,
            dq_mode: self.dq_mode,
        }
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

/// Returns the platform-specific config directory for wahoo.
///
/// On Linux: `~/.config/wahoo`
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wahoo"))
}
