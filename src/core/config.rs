//! Configuration parsing and validation.
//!
//! Tessera configuration is loaded from TOML files with CLI overrides.
//! Every section is optional; an empty file yields a working in-memory
//! setup.

use crate::catalog::validation::{validate_collection_name, validate_partition_tags};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level Tessera configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serving cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Filesystem paths.
    #[serde(default)]
    pub paths: PathConfig,

    /// Telemetry and diagnostics configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Collections loaded at startup.
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Serving cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity for ordinary admission, in bytes. Forced loads may exceed it.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,

    /// Background eviction interval in milliseconds.
    #[serde(default = "default_eviction_interval_ms")]
    pub eviction_interval_ms: u64,

    /// Run background eviction.
    #[serde(default = "default_eviction_enabled")]
    pub eviction_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_capacity_bytes(),
            eviction_interval_ms: default_eviction_interval_ms(),
            eviction_enabled: default_eviction_enabled(),
        }
    }
}

/// Filesystem path configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Storage directory; segment files live under `segments/`.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Catalog manifest path. Relative paths resolve against `storage_dir`.
    #[serde(default = "default_catalog_manifest")]
    pub catalog_manifest: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            catalog_manifest: default_catalog_manifest(),
        }
    }
}

impl PathConfig {
    /// Resolved catalog manifest path.
    pub fn catalog_manifest_path(&self) -> PathBuf {
        let manifest = Path::new(&self.catalog_manifest);
        if manifest.is_absolute() {
            manifest.to_path_buf()
        } else {
            Path::new(&self.storage_dir).join(manifest)
        }
    }
}

/// Telemetry and diagnostics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lifecycle requests kept in the audit buffer.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

/// Startup preload configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// Collections to force-load when the runtime starts.
    #[serde(default)]
    pub collections: Vec<PreloadCollection>,

    /// Abort startup if any preload fails.
    #[serde(default)]
    pub fail_on_error: bool,
}

/// One preloaded collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadCollection {
    pub name: String,
    #[serde(default)]
    pub partition_tags: Vec<String>,
}

// Default value functions

fn default_capacity_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_eviction_interval_ms() -> u64 {
    1_000
}

fn default_eviction_enabled() -> bool {
    true
}

fn default_storage_dir() -> String {
    "data".to_string()
}

fn default_catalog_manifest() -> String {
    "catalog.toml".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_audit_capacity() -> usize {
    1_024
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialize config")
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref storage_dir) = overrides.storage_dir {
            self.paths.storage_dir = storage_dir.clone();
        }
        if let Some(ref manifest) = overrides.catalog_manifest {
            self.paths.catalog_manifest = manifest.clone();
        }
        if let Some(capacity) = overrides.capacity_bytes {
            self.cache.capacity_bytes = capacity;
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_cache()?;
        self.validate_paths()?;
        self.validate_telemetry()?;
        self.validate_preload()?;
        Ok(())
    }

    fn validate_cache(&self) -> Result<()> {
        if self.cache.capacity_bytes == 0 {
            anyhow::bail!("cache.capacity_bytes must be > 0");
        }
        if self.cache.eviction_enabled && self.cache.eviction_interval_ms == 0 {
            anyhow::bail!("cache.eviction_interval_ms must be > 0 when eviction is enabled");
        }
        Ok(())
    }

    fn validate_paths(&self) -> Result<()> {
        if self.paths.storage_dir.trim().is_empty() {
            anyhow::bail!("paths.storage_dir must not be empty");
        }
        if self.paths.catalog_manifest.trim().is_empty() {
            anyhow::bail!("paths.catalog_manifest must not be empty");
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }

    fn validate_preload(&self) -> Result<()> {
        for (index, entry) in self.preload.collections.iter().enumerate() {
            validate_collection_name(&entry.name)
                .with_context(|| format!("preload.collections[{index}].name"))?;
            validate_partition_tags(&entry.partition_tags)
                .with_context(|| format!("preload.collections[{index}].partition_tags"))?;
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override storage directory.
    pub storage_dir: Option<String>,
    /// Override catalog manifest path.
    pub catalog_manifest: Option<String>,
    /// Override cache capacity.
    pub capacity_bytes: Option<u64>,
}
