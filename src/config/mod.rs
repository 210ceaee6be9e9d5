//! Configuration file loading
//!
//! The file is TOML with three optional sections:
//!
//! ```toml
//! [pipeline]
//! width = 1280
//! height = 720
//! rotate = 180
//! idle_timeout = 30.0
//!
//! [source]
//! fake = false
//! device = 0
//! width = 1280
//! height = 720
//! frame_rate = 10
//!
//! [encoder]
//! quality = 85
//! hardware = true
//! ```
//!
//! Missing keys and sections take their defaults. Unknown sections and keys
//! are errors.

pub mod sections;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use sections::{EncoderConfig, PipelineConfig, SourceConfig};

use sections::Section;

/// Rotations the encoders can apply
const VALID_ROTATIONS: [u32; 4] = [0, 90, 180, 270];

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown configuration section `{0}`")]
    UnknownSection(String),
    #[error("unknown configuration key `{section}.{key}`")]
    UnknownKey { section: &'static str, key: String },
    #[error("invalid value in section `{section}`: {message}")]
    InvalidValue {
        section: &'static str,
        message: String,
    },
    #[error("invalid configuration `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Complete application configuration, immutable after load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut table: toml::Table = toml::from_str(text)?;

        let config = Self {
            pipeline: take_section(&mut table)?,
            source: take_section(&mut table)?,
            encoder: take_section(&mut table)?,
        };

        if let Some(name) = table.keys().next() {
            return Err(ConfigError::UnknownSection(name.clone()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the type system does not capture
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, message: &str| {
            Err(ConfigError::Invalid {
                field,
                message: message.to_string(),
            })
        };

        if self.pipeline.width == 0 || self.pipeline.height == 0 {
            return invalid("pipeline.width", "output geometry must be non-zero");
        }
        if !VALID_ROTATIONS.contains(&self.pipeline.rotate) {
            return invalid("pipeline.rotate", "must be one of 0, 90, 180, 270");
        }
        if Duration::try_from_secs_f64(self.pipeline.idle_timeout).is_err() {
            return invalid(
                "pipeline.idle_timeout",
                "must be a non-negative number of seconds within range",
            );
        }
        if self.source.width == 0 || self.source.height == 0 {
            return invalid("source.width", "capture resolution must be non-zero");
        }
        if self.source.frame_rate == 0 {
            return invalid("source.frame_rate", "must be at least 1");
        }
        if !(1..=100).contains(&self.encoder.quality) {
            return invalid("encoder.quality", "must be between 1 and 100");
        }

        Ok(())
    }
}

/// Remove a section from the table and deserialize it
fn take_section<S: Section>(table: &mut toml::Table) -> Result<S, ConfigError> {
    let Some(value) = table.remove(S::NAME) else {
        return Ok(S::default());
    };

    let toml::Value::Table(section) = value else {
        return Err(ConfigError::InvalidValue {
            section: S::NAME,
            message: "expected a table".to_string(),
        });
    };

    if let Some(key) = section.keys().find(|key| !S::FIELDS.contains(&key.as_str())) {
        return Err(ConfigError::UnknownKey {
            section: S::NAME,
            key: key.clone(),
        });
    }

    toml::Value::Table(section)
        .try_into()
        .map_err(|err: toml::de::Error| ConfigError::InvalidValue {
            section: S::NAME,
            message: err.message().to_string(),
        })
}
