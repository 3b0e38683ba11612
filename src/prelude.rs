//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use scenario_tester::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, ScenarioError};

// Project
pub use crate::project::{DirTree, Entry, LinkOptions, Project, ProjectKind, TempOptions};

// Scenario
pub use crate::scenario::{
    ExecOptions, ExecOutput, Mutator, PrepareOptions, PreparedApp, ProjectFactory, Scenario,
    ScenarioRegistry, Scenarios, Shell, VariantStatus, mutator,
};

// Listing
pub use crate::listing::{ListParams, OutputParams, ScenarioManifest};
