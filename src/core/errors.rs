//! ST-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Top-level error type for scenario tester.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("[ST-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[ST-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[ST-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[ST-2001] cannot {operation} variant {variant:?} on a root scenario tree")]
    InvalidOperation {
        operation: &'static str,
        variant: String,
    },

    #[error(
        "[ST-2002] no variant named {variant} available to {operation}. Found variants: {}",
        .known.join(", ")
    )]
    UnknownVariant {
        operation: &'static str,
        variant: String,
        known: Vec<String>,
    },

    #[error(
        "[ST-2003] no matching scenario {query}. Try running \"scenario-tester list\" to see all available scenarios."
    )]
    NoMatchingScenario { query: String },

    #[error("[ST-2101] invalid project path {path:?}: {reason}")]
    InvalidProjectPath { path: String, reason: String },

    #[error("[ST-2102] unable to resolve package {name} from {from}")]
    UnresolvedDependency { name: String, from: PathBuf },

    #[error("[ST-2103] scenario callback failed: {details}")]
    Callback { details: String },

    #[error("[ST-2201] invalid scenario manifest {path}: {details}")]
    Manifest { path: PathBuf, details: String },

    #[error("[ST-2202] invalid glob pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[ST-3001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[ST-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[ST-3003] failed to spawn {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl ScenarioError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "ST-1001",
            Self::MissingConfig { .. } => "ST-1002",
            Self::ConfigParse { .. } => "ST-1003",
            Self::InvalidOperation { .. } => "ST-2001",
            Self::UnknownVariant { .. } => "ST-2002",
            Self::NoMatchingScenario { .. } => "ST-2003",
            Self::InvalidProjectPath { .. } => "ST-2101",
            Self::UnresolvedDependency { .. } => "ST-2102",
            Self::Callback { .. } => "ST-2103",
            Self::Manifest { .. } => "ST-2201",
            Self::InvalidPattern { .. } => "ST-2202",
            Self::Serialization { .. } => "ST-3001",
            Self::Io { .. } => "ST-3002",
            Self::Spawn { .. } => "ST-3003",
        }
    }

    /// Whether the failure stems from how the caller used the API or CLI,
    /// as opposed to the environment.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidOperation { .. }
                | Self::UnknownVariant { .. }
                | Self::NoMatchingScenario { .. }
                | Self::InvalidProjectPath { .. }
                | Self::Manifest { .. }
                | Self::InvalidPattern { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap an arbitrary failure raised inside a project factory or mutator.
    #[must_use]
    pub fn callback(details: impl std::fmt::Display) -> Self {
        Self::Callback {
            details: details.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScenarioError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ScenarioError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
