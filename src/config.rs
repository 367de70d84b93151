use crate::buffer::DEFAULT_MAX_CLOCK_ROTATIONS;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_POOL_SIZE: usize = 8;
const DEFAULT_LOG_FILE: &str = "clockdb.log";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// directory holding every database file and the log
    pub directory: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_clock_rotations")]
    pub max_clock_rotations: usize,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_max_clock_rotations() -> usize {
    DEFAULT_MAX_CLOCK_ROTATIONS
}

fn default_log_file() -> String {
    DEFAULT_LOG_FILE.to_string()
}

impl Config {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            pool_size: DEFAULT_POOL_SIZE,
            max_clock_rotations: DEFAULT_MAX_CLOCK_ROTATIONS,
            log_file: default_log_file(),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// `<directory> [gclock-rotations]`. A missing or unreadable
    /// rotation count falls back to the default.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut args = args.into_iter();
        let directory = match args.next() {
            Some(directory) => directory.as_ref().to_string(),
            None => return Err(ConfigError::Invalid("missing database directory".into())),
        };
        let mut config = Self::new(directory);
        match args.next().map(|arg| arg.as_ref().parse::<usize>()) {
            Some(Ok(rotations)) => config.max_clock_rotations = rotations,
            Some(Err(_)) | None => warn!(
                "could not parse a gclock rotation count, using {} instead",
                DEFAULT_MAX_CLOCK_ROTATIONS
            ),
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be positive".into()));
        }
        if self.max_clock_rotations == 0 {
            return Err(ConfigError::Invalid(
                "max_clock_rotations must be positive".into(),
            ));
        }
        if self.log_file.is_empty() {
            return Err(ConfigError::Invalid("log_file must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
