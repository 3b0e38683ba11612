//! Scenario matrices: declare, enumerate, prepare, execute.

#![allow(missing_docs)]

pub mod app;
pub mod registry;
pub mod runner;
pub mod tree;

pub use crate::project::ProjectKind;
pub use app::{ExecOptions, ExecOutput, PreparedApp, Shell, Stream};
pub use registry::ScenarioRegistry;
pub use runner::{PrepareOptions, ROOT_SCENARIO_NAME, Scenario};
pub use tree::{Mutator, ProjectFactory, Scenarios, VariantStatus, mutator};
