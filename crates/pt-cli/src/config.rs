//! Configuration loading and management.

use std::path::{Path, PathBuf};

use chrono::Duration;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use pt_core::{TrackerConfig, tracker};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long an online period may go without activity before it closes,
    /// in seconds.
    pub inactivity_threshold_secs: i64,
    /// Upper bound between inactivity checks, in milliseconds.
    pub check_cadence_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inactivity_threshold_secs: tracker::DEFAULT_INACTIVITY_THRESHOLD_SECS,
            check_cadence_ms: tracker::DEFAULT_CHECK_CADENCE_MS,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Precedence, lowest first: built-in defaults, `config.toml` in the
    /// platform config directory, the explicit file, `PT_*` environment
    /// variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("PT_"));

        figment.extract()
    }

    /// The tracker tunables this configuration describes.
    #[must_use]
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            inactivity_threshold: Duration::seconds(self.inactivity_threshold_secs),
            check_cadence: Duration::milliseconds(self.check_cadence_ms),
        }
    }
}

/// Returns the platform-specific config directory for pt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pt"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_core_defaults() {
        let config = Config::default();
        assert_eq!(config.inactivity_threshold_secs, 15 * 60);
        assert_eq!(config.check_cadence_ms, 100);
    }

    #[test]
    fn tracker_config_converts_units() {
        let config = Config {
            inactivity_threshold_secs: 60,
            check_cadence_ms: 250,
        };
        let tracker = config.tracker_config();
        assert_eq!(tracker.inactivity_threshold, Duration::minutes(1));
        assert_eq!(tracker.check_cadence, Duration::milliseconds(250));
    }

    #[test]
    fn explicit_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "inactivity_threshold_secs = 300\n").unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.inactivity_threshold_secs, 300);
        // Unspecified keys keep their defaults.
        assert_eq!(config.check_cadence_ms, 100);
    }
}
