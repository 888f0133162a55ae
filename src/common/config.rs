use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::duplicates::cluster::DEFAULT_THRESHOLD;
use crate::duplicates::fingerprint::HASH_BITS;
use crate::duplicates::scorer::QualityWeights;

/// Longest image side kept when decoding for fingerprints
pub const DEFAULT_MAX_DECODE_DIMENSION: u32 = 2048;

/// Global PhotoPrune configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Max Hamming distance (0-64) for two photos to count as similar
    #[serde(default = "default_threshold")]
    pub threshold: u32,

    /// Images larger than this on either side are downsampled before hashing (0 = off)
    #[serde(default = "default_max_decode_dimension")]
    pub max_decode_dimension: u32,

    /// Fingerprint workers (0 = one per CPU core)
    #[serde(default)]
    pub workers: usize,

    /// Minimum file size to consider, in bytes
    #[serde(default)]
    pub min_size: u64,

    /// Keeper selection weights
    #[serde(default)]
    pub weights: QualityWeights,
}

fn default_threshold() -> u32 {
    DEFAULT_THRESHOLD
}
fn default_max_decode_dimension() -> u32 {
    DEFAULT_MAX_DECODE_DIMENSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_decode_dimension: default_max_decode_dimension(),
            workers: 0,
            min_size: 0,
            weights: QualityWeights::default(),
        }
    }
}

impl Config {
    /// Get the PhotoPrune data directory (~/.photoprune)
    pub fn data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".photoprune")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::data_dir().join("config.toml")
    }

    /// Load config from the default location, or defaults if it does not exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold > HASH_BITS {
            anyhow::bail!(
                "threshold must be between 0 and {}, got {}",
                HASH_BITS,
                self.threshold
            );
        }
        if !self.weights.is_valid() {
            anyhow::bail!("weights must be finite, non-negative and not all zero");
        }
        Ok(())
    }
}
