/// Daemon configuration
use crate::error::{DaemonError, Result};
use cadence_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` isn't given and the file exists
pub const DEFAULT_CONFIG_FILE: &str = "cadenced.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default = "default_engine")]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Keep library, history and resume record in memory only
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    /// Fail loads for files that don't exist
    #[serde(default = "default_check_files")]
    pub check_files: bool,

    /// Duration assumed for tracks added by path that the library doesn't know
    #[serde(default = "default_fallback_duration_secs")]
    pub fallback_duration_secs: u64,
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `cadenced.toml` in the
    /// working directory is used when present. Environment variables
    /// prefixed `CADENCE_` override both, with `__` between nested keys
    /// (e.g. `CADENCE_PLAYBACK__VOLUME=60`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DaemonError::Config(format!(
                        "config file {} not found",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| DaemonError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if playback.volume > 100 {
            return Err(DaemonError::Config(format!(
                "playback.volume must be 0-100, got {}",
                playback.volume
            )));
        }
        if !(0.0..=1.0).contains(&playback.duck_level) {
            return Err(DaemonError::Config(format!(
                "playback.duck_level must be within 0.0-1.0, got {}",
                playback.duck_level
            )));
        }
        if !(playback.skipped_fraction >= 0.0
            && playback.skipped_fraction < playback.completed_fraction
            && playback.completed_fraction <= 1.0)
        {
            return Err(DaemonError::Config(
                "playback fractions must satisfy 0 <= skipped_fraction < completed_fraction <= 1"
                    .to_string(),
            ));
        }
        if playback.sleep_tick_ms == 0 || playback.position_interval_ms == 0 {
            return Err(DaemonError::Config(
                "playback tick intervals must be greater than zero".to_string(),
            ));
        }
        if self.engine.fallback_duration_secs == 0 {
            return Err(DaemonError::Config(
                "engine.fallback_duration_secs must be greater than zero".to_string(),
            ));
        }
        if !self.storage.ephemeral && self.storage.database_url.is_empty() {
            return Err(DaemonError::Config(
                "storage.database_url is required (set CADENCE_STORAGE__DATABASE_URL)".to_string(),
            ));
        }

        Ok(())
    }
}

// Default values
fn default_storage() -> StorageSettings {
    StorageSettings {
        database_url: default_database_url(),
        ephemeral: false,
    }
}

fn default_database_url() -> String {
    "sqlite://./data/cadence.db".to_string()
}

fn default_engine() -> EngineSettings {
    EngineSettings {
        check_files: default_check_files(),
        fallback_duration_secs: default_fallback_duration_secs(),
    }
}

fn default_check_files() -> bool {
    true
}

fn default_fallback_duration_secs() -> u64 {
    180
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            playback: PlaybackConfig::default(),
            engine: default_engine(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::RepeatMode;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = DaemonConfig::default();
        config.validate().unwrap();
        assert_eq!(config.playback.host_grace_ms, 30_000);
        assert!(config.engine.check_files);
    }

    #[test]
    fn file_overrides_nested_sections() {
        let file = write_config(
            r#"
            [storage]
            ephemeral = true

            [playback]
            volume = 55
            repeat = "all"
            resume_on_headphones = true
            "#,
        );

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert!(config.storage.ephemeral);
        assert_eq!(config.playback.volume, 55);
        assert_eq!(config.playback.repeat, RepeatMode::All);
        assert!(config.playback.resume_on_headphones);
        // Untouched keys keep their defaults
        assert_eq!(config.playback.fade_window_ms, 30_000);
        assert_eq!(config.engine.fallback_duration_secs, 180);
    }

    #[test]
    fn zero_fallback_duration_from_file_is_rejected() {
        let file = write_config(
            r#"
            [engine]
            fallback_duration_secs = 0
            "#,
        );

        let config = DaemonConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.fallback_duration_secs, 0);
        assert!(matches!(config.validate(), Err(DaemonError::Config(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = DaemonConfig::load(Some(Path::new("/nonexistent/cadenced.toml"))).unwrap_err();
        assert!(matches!(err, DaemonError::Config(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = DaemonConfig::default();
        config.playback.volume = 120;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.playback.duck_level = 1.5;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.playback.skipped_fraction = 0.9;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.engine.fallback_duration_secs = 0;
        assert!(config.validate().is_err());

        let mut config = DaemonConfig::default();
        config.storage.database_url.clear();
        assert!(config.validate().is_err());
        config.storage.ephemeral = true;
        assert!(config.validate().is_ok());
    }
}
