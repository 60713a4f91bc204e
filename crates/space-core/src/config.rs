use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SpaceError, SpaceResult};

/// Top-level client configuration (loaded from space.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    pub client: ClientConfig,
    pub chunks: ChunkConfig,
    pub files: FilesConfig,
    pub network: NetworkConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root directory holding the record cache and keystore (default: ~/.space)
    pub root: PathBuf,
    /// Alias to act as; falls back to the keystore's alias
    pub alias: Option<String>,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

/// FastCDC bounds used when splitting a file into chunk records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub min_size: u32,
    pub avg_size: u32,
    /// Hard ceiling on a single chunk's plaintext size
    pub max_size: u32,
}

/// How `add` represents a new file's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// Encrypted chunk records referenced from the Meta
    #[default]
    Chunked,
    /// Insert-only deltas on the file's delta channel
    Delta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub mode: FileMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Push freshly mined blocks to peers
    pub push: bool,
}

/// Passphrase protection for the keystore
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
    /// Keystore file (default: <root>/keystore.json)
    pub keystore: Option<PathBuf>,
}

impl SpaceConfig {
    /// Load from `path`, or return defaults when the file does not exist.
    pub fn load(path: &Path) -> SpaceResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: SpaceConfig = toml::from_str(&content)
            .map_err(|e| SpaceError::Config(format!("parsing {}: {e}", path.display())))?;
        config.chunks.validate()?;
        Ok(config)
    }

    pub fn keystore_path(&self) -> PathBuf {
        self.crypto
            .keystore
            .clone()
            .unwrap_or_else(|| self.client.root.join("keystore.json"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.client.root.join("cache")
    }
}

impl ChunkConfig {
    /// FastCDC's own lower limits for each bound.
    pub const MINIMUM_MIN: u32 = 64;
    pub const AVERAGE_MIN: u32 = 256;
    pub const MAXIMUM_MIN: u32 = 1024;

    pub fn validate(&self) -> SpaceResult<()> {
        if self.min_size < Self::MINIMUM_MIN
            || self.avg_size < Self::AVERAGE_MIN
            || self.max_size < Self::MAXIMUM_MIN
        {
            return Err(SpaceError::Config(format!(
                "chunk sizes below FastCDC limits (min >= {}, avg >= {}, max >= {}): {:?}",
                Self::MINIMUM_MIN,
                Self::AVERAGE_MIN,
                Self::MAXIMUM_MIN,
                self
            )));
        }
        if self.min_size > self.avg_size || self.avg_size > self.max_size {
            return Err(SpaceError::Config(format!(
                "chunk sizes must satisfy min <= avg <= max: {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        Self {
            root: PathBuf::from(home).join(".space"),
            alias: None,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_size: 16 * 1024,  // 16KB
            avg_size: 64 * 1024,  // 64KB
            max_size: 256 * 1024, // 256KB
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { push: true }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
            keystore: None,
        }
    }
}
