use std::fs;
use std::path::{Path, PathBuf};

use hostbridge_codec::{CodecLimits, DEFAULT_MAX_CONTENT_BYTES, DEFAULT_MAX_DEPTH};
use serde::Deserialize;
use thiserror::Error;

use crate::limiter::DEFAULT_CAPACITY;
use crate::miss::MissPolicy;

/// Bridge settings, read from TOML. Every section and field is optional.
///
/// ```toml
/// [limiter]
/// capacity = 5
///
/// [codec]
/// max_depth = 64
/// max_content_bytes = 67108864
///
/// [handles]
/// miss_policy = "log"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub limiter: LimiterConfig,
    pub codec: CodecConfig,
    pub handles: HandlesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimiterConfig {
    /// Concurrent native calls. Default: 5.
    pub capacity: usize,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Container nesting limit. Default: 64.
    pub max_depth: usize,
    /// Envelope content limit in bytes. Default: 64 MiB.
    pub max_content_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandlesConfig {
    pub miss_policy: MissPolicy,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse config: {0}")]
    Syntax(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Syntax(_) | ConfigError::Invalid(_) => None,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read bridge config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        let config: Self = match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("Failed to parse bridge config at {:?}: {}", path, err);
                return Err(ConfigError::Parse { path, source: err });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limiter.capacity == 0 {
            return Err(ConfigError::Invalid(
                "limiter.capacity must be at least 1".to_owned(),
            ));
        }
        if self.codec.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "codec.max_depth must be at least 1".to_owned(),
            ));
        }
        if self.codec.max_content_bytes == 0 {
            return Err(ConfigError::Invalid(
                "codec.max_content_bytes must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn codec_limits(&self) -> CodecLimits {
        CodecLimits {
            max_depth: self.codec.max_depth,
            max_content_bytes: self.codec.max_content_bytes,
        }
    }
}
