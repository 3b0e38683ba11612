//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScenarioError};

/// File name looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "scenario-tester.toml";

/// Full scenario tester configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub prepare: PrepareConfig,
    pub execute: ExecuteConfig,
    pub logging: LoggingConfig,
    /// Path the configuration was loaded from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// How scenarios are materialized when no output directory is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PrepareConfig {
    /// Prefix for auto-allocated temporary directories.
    pub temp_prefix: String,
    /// Leave temporary directories on disk after the prepared app is dropped.
    pub keep_temp_dirs: bool,
}

/// Shell used by `PreparedApp::execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecuteConfig {
    pub shell: String,
    pub shell_arg: String,
}

/// Activity log and diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// JSONL activity log. Disabled when unset.
    pub activity_log: Option<PathBuf>,
    /// Echo lifecycle diagnostics to stderr.
    pub verbose: bool,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            temp_prefix: "scenario-".to_string(),
            keep_temp_dirs: false,
        }
    }
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        if cfg!(windows) {
            Self {
                shell: "cmd".to_string(),
                shell_arg: "/C".to_string(),
            }
        } else {
            Self {
                shell: "sh".to_string(),
                shell_arg: "-c".to_string(),
            }
        }
    }
}

impl Config {
    /// Default configuration path (relative to the current directory).
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_var)
    }

    fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf)
                .map_err(|source| ScenarioError::io(&path_buf, source))?;
            let mut parsed: Self = toml::from_str(&raw)?;
            parsed.source = Some(path_buf);
            parsed
        } else if is_explicit_path {
            return Err(ScenarioError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // prepare
        if let Some(raw) = lookup("SCENARIO_TESTER_TEMP_PREFIX") {
            self.prepare.temp_prefix = raw;
        }
        if let Some(raw) = lookup("SCENARIO_TESTER_KEEP_TEMP_DIRS") {
            self.prepare.keep_temp_dirs = parse_env_bool("SCENARIO_TESTER_KEEP_TEMP_DIRS", &raw)?;
        }

        // execute
        if let Some(raw) = lookup("SCENARIO_TESTER_SHELL") {
            self.execute.shell = raw;
        }
        if let Some(raw) = lookup("SCENARIO_TESTER_SHELL_ARG") {
            self.execute.shell_arg = raw;
        }

        // logging
        if let Some(raw) = lookup("SCENARIO_TESTER_ACTIVITY_LOG") {
            self.logging.activity_log = if raw.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(raw))
            };
        }
        if let Some(raw) = lookup("SCENARIO_TESTER_VERBOSE") {
            self.logging.verbose = parse_env_bool("SCENARIO_TESTER_VERBOSE", &raw)?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let prefix = &self.prepare.temp_prefix;
        if prefix.is_empty() {
            return Err(ScenarioError::InvalidConfig {
                details: "prepare.temp_prefix must not be empty".to_string(),
            });
        }
        if prefix.contains('/') || prefix.contains('\\') {
            return Err(ScenarioError::InvalidConfig {
                details: format!("prepare.temp_prefix must not contain path separators: {prefix:?}"),
            });
        }
        if self.execute.shell.trim().is_empty() {
            return Err(ScenarioError::InvalidConfig {
                details: "execute.shell must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScenarioError::InvalidConfig {
            details: format!("env var {name} must be a boolean, got {raw:?}"),
        }),
    }
}
