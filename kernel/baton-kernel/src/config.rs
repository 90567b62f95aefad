//! Kernel configuration.
//!
//! A [`KernelConfig`] is usually read from a TOML file and then overlaid
//! with command-line flags by the bootstrap tool. Every field has a
//! default, so an empty file is a valid configuration:
//!
//! ```toml
//! debug = "ti"
//! log_level = "debug"
//!
//! [ticks]
//! system = 10
//! user = 1
//!
//! [timer]
//! ticks = 100
//! random_seed = 42
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use baton_core::stats::{TIMER_TICKS, TickCosts};
use serde::{Deserialize, Serialize};

use crate::log::{DebugFlags, LogLevel};

/// Errors raised while loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for a [`KernelConfig`].
    Parse(toml::de::Error),
    /// The values parse but cannot drive a machine.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read {}: {source}", path.display())
            }
            ConfigError::Parse(e) => write!(f, "invalid configuration: {e}"),
            ConfigError::Invalid(why) => write!(f, "invalid configuration: {why}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Timer device settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerConfig {
    /// Attach a periodic timer even without a random seed.
    pub enabled: bool,
    /// Mean ticks between timer interrupts.
    pub ticks: u64,
    /// Seed for randomized timer intervals. Setting a seed attaches the
    /// timer.
    pub random_seed: Option<u64>,
}

impl TimerConfig {
    /// Whether the kernel should attach a timer at boot.
    pub fn is_attached(&self) -> bool {
        self.enabled || self.random_seed.is_some()
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ticks: TIMER_TICKS,
            random_seed: None,
        }
    }
}

/// Top-level kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Debug flag letters, see [`DebugFlags::parse`].
    pub debug: String,
    /// Maximum level written by the bootstrap tool's log sink.
    pub log_level: LogLevel,
    /// Clock cost of kernel and user execution.
    pub ticks: TickCosts,
    /// Timer device.
    pub timer: TimerConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            debug: String::new(),
            log_level: LogLevel::Info,
            ticks: TickCosts::default(),
            timer: TimerConfig::default(),
        }
    }
}

impl KernelConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks values that deserialize fine but would stall the clock.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks.system == 0 {
            return Err(ConfigError::Invalid("ticks.system must be positive"));
        }
        if self.ticks.user == 0 {
            return Err(ConfigError::Invalid("ticks.user must be positive"));
        }
        if self.timer.ticks == 0 {
            return Err(ConfigError::Invalid("timer.ticks must be positive"));
        }
        Ok(())
    }

    /// Returns the parsed debug flags.
    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::parse(&self.debug)
    }
}
