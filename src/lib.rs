#![forbid(unsafe_code)]

//! Scenario tester: build a matrix of project variants for integration tests.
//!
//! A [`Scenarios`](scenario::Scenarios) tree starts from one base project and
//! is refined by named variants:
//!
//! - `expand` derives one variant per named mutator,
//! - `skip` and `only` narrow the variants of a node,
//! - `map` appends a step to every variant.
//!
//! Nothing runs until a [`Scenario`](scenario::Scenario) produced by
//! `for_each_scenario` is prepared onto disk, after which commands can be
//! executed inside it.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use scenario_tester::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use scenario_tester::core::config::Config;
//! use scenario_tester::listing::manifest::ScenarioManifest;
//! ```

pub mod prelude;

pub mod core;
pub mod listing;
pub mod logger;
pub mod project;
pub mod scenario;
