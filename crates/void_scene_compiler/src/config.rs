//! Compiler configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Command line flags (applied by the caller)
//! 2. Environment variables: `VOID_SCENE_TARGET`, `VOID_SCENE_JOBS`
//! 3. Config file, e.g. `scenec.toml`
//! 4. Built-in defaults
//!
//! # Example Config File
//!
//! ```toml
//! rhi_target = "Vulkan"
//! output_directory = "compiled"
//! cache_database = "compiled/scene_cache.bin"
//! asset_catalog = "assets/catalog.json"
//! jobs = 4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`CompilerConfig::rhi_target`]
pub const ENV_TARGET: &str = "VOID_SCENE_TARGET";
/// Environment variable overriding [`CompilerConfig::jobs`]
pub const ENV_JOBS: &str = "VOID_SCENE_JOBS";

/// Errors from loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Scene compiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Render hardware interface target the artifacts are built for
    pub rhi_target: String,
    /// Directory receiving `<stem>.scene` artifacts
    pub output_directory: PathBuf,
    /// Build cache database, in-memory cache when unset
    pub cache_database: Option<PathBuf>,
    /// Asset catalog JSON file
    pub asset_catalog: Option<PathBuf>,
    /// Worker threads for batch builds, 0 = one per core
    pub jobs: usize,
    /// Rebuild even when the cache says up to date
    pub force: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            rhi_target: "Vulkan".to_string(),
            output_directory: PathBuf::from("compiled"),
            cache_database: None,
            asset_catalog: None,
            jobs: 0,
            force: false,
        }
    }
}

impl CompilerConfig {
    /// Load from a TOML file; missing keys keep their defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded compiler config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply process environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(target) = lookup(ENV_TARGET).filter(|t| !t.is_empty()) {
            log::info!("RHI target from env: {}", target);
            self.rhi_target = target;
        }

        if let Some(jobs) = lookup(ENV_JOBS) {
            match jobs.parse() {
                Ok(jobs) => self.jobs = jobs,
                Err(_) => log::warn!("Ignoring invalid {}={}", ENV_JOBS, jobs),
            }
        }
    }

    /// Worker count with `0` resolved to the available parallelism
    pub fn effective_jobs(&self) -> usize {
        if self.jobs > 0 {
            return self.jobs;
        }
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = CompilerConfig::from_toml("rhi_target = \"Direct3D12\"\njobs = 3\n").unwrap();
        assert_eq!(config.rhi_target, "Direct3D12");
        assert_eq!(config.jobs, 3);
        assert_eq!(config.output_directory, PathBuf::from("compiled"));
        assert!(config.cache_database.is_none());
    }

    #[test]
    fn test_invalid_file() {
        assert!(matches!(
            CompilerConfig::from_toml("jobs = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let mut config = CompilerConfig::default();
        config.apply_overrides(|name| match name {
            ENV_TARGET => Some("OpenGLES3".to_string()),
            ENV_JOBS => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.rhi_target, "OpenGLES3");
        assert_eq!(config.jobs, 0);

        config.apply_overrides(|name| (name == ENV_JOBS).then(|| "8".to_string()));
        assert_eq!(config.jobs, 8);
        assert_eq!(config.effective_jobs(), 8);
        assert_eq!(config.rhi_target, "OpenGLES3");
    }
}
