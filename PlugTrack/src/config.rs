//! Tracker configuration
//!
//! Loaded from `<config dir>/plugtrack/config.toml` when present. Keys that
//! are missing take their defaults; the plugin and installation folders fall
//! back to `SC4_PLUGINS` and `SC4_INSTALLATION`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default memory budget for decoded records, in bytes.
pub const DEFAULT_MEMORY: u64 = 4 * 1024 * 1024 * 1024;

// Default value functions for serde
fn default_plugins() -> Option<PathBuf> {
    std::env::var_os("SC4_PLUGINS").map(PathBuf::from)
}
fn default_installation() -> Option<PathBuf> {
    std::env::var_os("SC4_INSTALLATION").map(PathBuf::from)
}
fn default_true() -> bool {
    true
}
fn default_memory() -> u64 {
    DEFAULT_MEMORY
}
fn default_cache_ratio() -> f64 {
    0.5
}
fn default_scan_concurrency() -> usize {
    500
}
fn default_family_concurrency() -> usize {
    4096
}
fn default_extensions() -> Vec<String> {
    ["dat", "sc4lot", "sc4desc", "sc4model"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_exclude_packages() -> Vec<String> {
    vec!["simfox:day-and-nite-mod".to_string()]
}

/// Settings shared by the index and the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Plugins folder.
    #[serde(default = "default_plugins")]
    pub plugins: Option<PathBuf>,
    /// Game installation folder.
    #[serde(default = "default_installation")]
    pub installation: Option<PathBuf>,
    /// Whether the installation folder is indexed.
    #[serde(default = "default_true")]
    pub scan_installation: bool,
    /// Persisted index file. Loaded when it exists, written otherwise.
    #[serde(default)]
    pub cache: Option<PathBuf>,
    /// Memory available for decoded records, in bytes.
    #[serde(default = "default_memory")]
    pub memory: u64,
    /// Share of `memory` given to the record cache.
    #[serde(default = "default_cache_ratio")]
    pub cache_ratio: f64,
    /// Worker threads. 0 uses the available parallelism.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_family_concurrency")]
    pub family_concurrency: usize,
    /// Archive extensions picked up by directory patterns.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Package ids never reported as dependencies.
    #[serde(default = "default_exclude_packages")]
    pub exclude_packages: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            plugins: default_plugins(),
            installation: default_installation(),
            scan_installation: true,
            cache: None,
            memory: DEFAULT_MEMORY,
            cache_ratio: default_cache_ratio(),
            threads: 0,
            scan_concurrency: default_scan_concurrency(),
            family_concurrency: default_family_concurrency(),
            extensions: default_extensions(),
            exclude_packages: default_exclude_packages(),
        }
    }
}

impl TrackerConfig {
    /// Default location of the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("plugtrack").join("config.toml"))
    }

    /// Load the config from its default location, or the defaults when
    /// there is no file.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load the config from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the config as pretty-printed TOML, creating parent folders.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Byte budget of the record cache.
    pub fn cache_budget(&self) -> usize {
        (self.memory as f64 * self.cache_ratio.clamp(0.0, 1.0)) as usize
    }

    /// Number of workers for a phase with the given concurrency limit.
    pub fn workers(&self, concurrency: usize) -> usize {
        let threads = if self.threads == 0 {
            std::thread::available_parallelism().map_or(4, std::num::NonZero::get)
        } else {
            self.threads
        };
        concurrency.min(threads).max(1)
    }

    /// A dedicated pool bounded by the given concurrency limit.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created.
    pub fn pool(&self, concurrency: usize) -> Result<rayon::ThreadPool> {
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers(concurrency))
            .build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: TrackerConfig = toml::from_str("threads = 2\nplugins = \"/plugins\"").unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.plugins, Some(PathBuf::from("/plugins")));
        assert_eq!(config.memory, DEFAULT_MEMORY);
        assert_eq!(config.cache_budget(), (DEFAULT_MEMORY / 2) as usize);
        assert_eq!(config.exclude_packages, vec!["simfox:day-and-nite-mod"]);
        assert_eq!(config.extensions.len(), 4);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = TrackerConfig {
            plugins: Some(PathBuf::from("/sc4/Plugins")),
            installation: None,
            cache: Some(PathBuf::from("/tmp/index.ptix")),
            threads: 3,
            ..TrackerConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(TrackerConfig::load_from(&path).unwrap().threads, 3);
        assert_eq!(
            TrackerConfig::load_from(&path).unwrap().cache,
            Some(PathBuf::from("/tmp/index.ptix"))
        );
    }

    #[test]
    fn test_workers_clamped_to_threads() {
        let config = TrackerConfig {
            threads: 8,
            ..TrackerConfig::default()
        };
        assert_eq!(config.workers(500), 8);
        assert_eq!(config.workers(2), 2);
        assert_eq!(config.workers(0), 1);
    }
}
