use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Output pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub output_rate: u32,
    pub output_channels: u16,
    pub preferred_device: Option<String>,
    /// Initial volume level, 0 to 100
    pub volume: u8,
    /// Largest samples entry the fifo stores, in samples
    pub fifo_chunk_size: usize,
    /// The decoder works while less than this much audio is buffered
    pub decoder_watermark_secs: f64,
    /// Device ring buffer size in frames
    pub output_buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_rate: 44100,
            output_channels: 2,
            preferred_device: None,
            volume: 100,
            fifo_chunk_size: 4096,
            decoder_watermark_secs: 2.0,
            output_buffer_size: 8192,
        }
    }
}

/// Where the media library is scanned from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibraryConfig {
    pub roots: Vec<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: dirs::audio_dir().into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonSection {
    pub pidfile: PathBuf,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            pidfile: dirs::runtime_dir()
                .or_else(dirs::cache_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join("hiresd.pid"),
        }
    }
}

/// Daemon configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub audio: AudioConfig,
    pub library: LibraryConfig,
    pub daemon: DaemonSection,
}

impl DaemonConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if audio.output_rate == 0 {
            return Err(invalid("audio.output_rate", "must be positive"));
        }
        if audio.output_channels == 0 {
            return Err(invalid("audio.output_channels", "must be positive"));
        }
        if audio.volume > 100 {
            return Err(invalid("audio.volume", "must be between 0 and 100"));
        }
        if audio.fifo_chunk_size == 0 {
            return Err(invalid("audio.fifo_chunk_size", "must be positive"));
        }
        if audio.decoder_watermark_secs.is_nan() || audio.decoder_watermark_secs <= 0.0 {
            return Err(invalid("audio.decoder_watermark_secs", "must be positive"));
        }
        if audio.output_buffer_size == 0 {
            return Err(invalid("audio.output_buffer_size", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: DaemonConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from the default location, falling back to defaults when the file is missing
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path(Self::default_config_path()?)
    }

    /// Load from `config_path`. A missing file yields defaults, a malformed one an error.
    pub fn from_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;
        config.validate()?;

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut DaemonConfig),
    {
        let mut config = self.config.clone();
        updater(&mut config);
        config.validate()?;

        self.config = config;
        self.save_config()
    }

    pub fn set_volume(&mut self, volume: u8) -> Result<(), ConfigError> {
        self.update_config(|config| config.audio.volume = volume.min(100))
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = DaemonConfig::default();
        self.save_config()
    }

    fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join("hires-player-daemon");

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
        if !path.exists() {
            return Ok(DaemonConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_manager = ConfigManager {
            config: DaemonConfig::default(),
            config_path,
        };

        (config_manager, temp_dir)
    }

    #[test]
    fn test_audio_config_default() {
        let config = AudioConfig::default();

        assert_eq!(config.output_rate, 44100);
        assert_eq!(config.output_channels, 2);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.volume, 100);
        assert!(DaemonConfig::default().validate().is_ok());
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.audio.volume = 60;
        config_manager.config.audio.preferred_device = Some("Test DAC".to_string());
        config_manager.config.library.roots = vec![PathBuf::from("/music")];
        config_manager.save_config().unwrap();

        let loaded = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded, config_manager.config);
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::from_path(temp_dir.path().join("missing.toml")).unwrap();

        assert_eq!(manager.get_config(), &DaemonConfig::default());
        // nothing is written until asked
        assert!(!manager.config_path().exists());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[audio]\noutput_rate = 96000\n").unwrap();

        let manager = ConfigManager::from_path(config_path).unwrap();
        let audio = &manager.get_config().audio;
        assert_eq!(audio.output_rate, 96000);
        assert_eq!(audio.output_channels, 2);
        assert_eq!(audio.fifo_chunk_size, AudioConfig::default().fifo_chunk_size);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::from_path(config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[audio]\noutput_channels = 0\n").unwrap();

        match ConfigManager::from_path(config_path) {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "audio.output_channels"),
            other => panic!("Expected InvalidValue, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_update_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager
            .update_config(|config| {
                config.audio.output_rate = 48000;
                config.audio.fifo_chunk_size = 1024;
            })
            .unwrap();

        let loaded = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded.audio.output_rate, 48000);
        assert_eq!(loaded.audio.fifo_chunk_size, 1024);

        // rejected updates leave the config untouched
        assert!(config_manager
            .update_config(|config| config.audio.output_rate = 0)
            .is_err());
        assert_eq!(config_manager.get_config().audio.output_rate, 48000);
    }

    #[test]
    fn test_set_volume_clamps() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_volume(70).unwrap();
        assert_eq!(config_manager.get_config().audio.volume, 70);

        config_manager.set_volume(250).unwrap();
        assert_eq!(config_manager.get_config().audio.volume, 100);
    }

    #[test]
    fn test_reset_to_defaults() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();
        config_manager.config.audio.volume = 10;

        config_manager.reset_to_defaults().unwrap();
        assert_eq!(config_manager.get_config(), &DaemonConfig::default());
    }

    #[test]
    fn test_config_path_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config").join("config.toml");

        let config_manager = ConfigManager {
            config: DaemonConfig::default(),
            config_path: nested_path.clone(),
        };
        config_manager.save_config().unwrap();

        assert!(nested_path.exists());
    }

    #[test]
    fn test_toml_format() {
        let mut config = DaemonConfig::default();
        config.audio.preferred_device = Some("AudioQuest DragonFly".to_string());

        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[audio]"));
        assert!(toml_string.contains("[library]"));
        assert!(toml_string.contains("[daemon]"));
        assert!(toml_string.contains("output_rate = 44100"));
        assert!(toml_string.contains("AudioQuest DragonFly"));
    }
}
