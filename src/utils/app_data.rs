use crate::index::Layout;
use crate::sequence::{Codec, DEFAULT_LOG_PARTITION_SIZE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "trix";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory.
/// Command line flags take precedence over every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Layout used by `build` when none is given
    #[serde(default = "default_layout")]
    pub layout: Layout,

    /// Nodes codec used by `build` when none is given
    #[serde(default = "default_codec")]
    pub codec: Codec,

    /// log2 of the partitioned Elias-Fano partition size
    #[serde(default = "default_log_partition_size")]
    pub log_partition_size: u8,

    /// Worker threads for building and checking.
    /// 0 uses the number of CPU cores
    #[serde(default)]
    pub threads: usize,

    /// Show progress spinners
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_layout() -> Layout {
    Layout::ThreeTries
}

fn default_codec() -> Codec {
    Codec::PartitionedEliasFano
}

fn default_log_partition_size() -> u8 {
    DEFAULT_LOG_PARTITION_SIZE
}

fn default_progress() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            layout: default_layout(),
            codec: default_codec(),
            log_partition_size: default_log_partition_size(),
            threads: 0,
            progress: default_progress(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path).context("Failed to read config file")?;
            let config: AppConfig = serde_json::from_str(&content).context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Get the effective thread count (resolves 0 to CPU count)
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 { num_cpus() } else { self.threads }
    }
}

/// Get the number of CPUs available
fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.layout, Layout::ThreeTries);
        assert_eq!(config.codec, Codec::PartitionedEliasFano);
        assert_eq!(config.log_partition_size, 7);
        assert!(config.progress);
    }

    #[test]
    fn test_app_config_effective_threads() {
        let mut config = AppConfig::default();

        // 0 should resolve to CPU count
        assert!(config.effective_threads() >= 1);

        config.threads = 4;
        assert_eq!(config.effective_threads(), 4);
    }

    #[test]
    fn test_app_config_partial_json() {
        // Should use defaults for missing fields
        let json = r#"{"layout": "spo-ops", "codec": "ef"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.layout, Layout::SpoOps);
        assert_eq!(config.codec, Codec::EliasFano);
        assert_eq!(config.log_partition_size, 7);
        assert_eq!(config.threads, 0);
    }

    #[test]
    fn test_app_config_mixed_codec() {
        let config: AppConfig = serde_json::from_str(r#"{"codec": "compact-pef"}"#).unwrap();
        assert_eq!(config.codec, Codec::CompactPef);
    }

    #[test]
    fn test_app_config_empty_json() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_app_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());

        let config = AppConfig {
            layout: Layout::RankedThreeTries,
            codec: Codec::PefCompact,
            log_partition_size: 5,
            threads: 2,
            progress: false,
        };
        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), config);

        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
