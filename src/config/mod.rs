//! Configuration module for pipegraph
//!
//! The engine configuration is a TOML file with three tables:
//! - `[context]` - defaults for every run (test mode, verbose plan logging,
//!   values for user-input modules)
//! - `[runtime]` - execution mode and the async per-record timeout
//! - `[logging]` - tracing filter used when `RUST_LOG` is unset
//!
//! # Config Location
//!
//! - **Linux**: `~/.config/dev.pipegraph/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.pipegraph/config.toml`
//! - **Windows**: `%APPDATA%\dev.pipegraph\config.toml`
//!
//! # Example
//!
//! ```toml
//! [context]
//! test = true
//! inputs = { limit = "5" }
//!
//! [runtime]
//! async_mode = true
//! record_timeout_ms = 2000
//!
//! [logging]
//! filter = "warn,pipegraph_rs=info"
//! ```

use crate::error::{PipegraphError, Result, ResultExt};
use crate::pipeline::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.pipegraph";

/// Engine config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Tracing filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,pipegraph_rs=debug";

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

// ==================== Context ====================

/// Run defaults applied to every [`ExecutionContext`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Never prompt for user inputs
    pub test: bool,

    /// Log every resolved plan step
    pub verbose: bool,

    /// Values for user-input modules, by input name
    pub inputs: BTreeMap<String, String>,
}

// ==================== Runtime ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Run pipes on the tokio runtime instead of pulling synchronously
    pub async_mode: bool,

    /// Upper bound for producing one record in async mode
    pub record_timeout_ms: Option<u64>,
}

impl RuntimeConfig {
    pub fn record_timeout(&self) -> Option<Duration> {
        self.record_timeout_ms.map(Duration::from_millis)
    }
}

// ==================== Logging ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

// ==================== Engine Config ====================

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub context: ContextConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Path of the config file in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PipegraphError::from)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        toml::from_str(&content)
            .map_err(|e| PipegraphError::Config(e.to_string()))
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipegraphError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PipegraphError::Serialization(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| {
            PipegraphError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Build the per-run execution context from the `[context]` table
    pub fn execution_context(&self) -> ExecutionContext {
        let mut context = ExecutionContext {
            test: self.context.test,
            verbose: self.context.verbose,
            ..ExecutionContext::default()
        };
        for (name, value) in &self.context.inputs {
            context = context.with_input(name.clone(), value.clone());
        }
        context
    }
}
