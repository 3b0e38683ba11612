//! Discovering scenarios from manifests, rendering them, writing one out.

#![allow(missing_docs)]

pub mod glob;
pub mod manifest;

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::resolve_absolute_path;
use crate::logger::{self, ActivityEvent};
use crate::scenario::{PrepareOptions, Scenario, ScenarioRegistry};

pub use manifest::{ScenarioManifest, Step};

/// Which manifests to load.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    /// Glob patterns, loaded in order.
    pub files: Vec<String>,
    /// Individual manifests loaded before any glob.
    pub require: Vec<PathBuf>,
    /// Directory relative paths and patterns resolve against.
    pub cwd: PathBuf,
}

impl ListParams {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ..Self::default()
        }
    }
}

/// Load every manifest named by `params` into `registry` and return all
/// scenarios recorded there, in recording order.
///
/// A manifest reached twice (by `require` and a glob, or by two globs) is
/// only loaded once.
pub fn list(params: &ListParams, registry: &ScenarioRegistry) -> Result<Vec<Scenario>> {
    let cwd = resolve_absolute_path(&params.cwd);
    let mut loaded = HashSet::new();

    for required in &params.require {
        let path = resolve_absolute_path(&cwd.join(required));
        if !path.is_file() {
            return Err(ScenarioError::io(
                &path,
                std::io::Error::new(ErrorKind::NotFound, "required manifest not found"),
            ));
        }
        load_once(&path, registry, &mut loaded)?;
    }
    for pattern in &params.files {
        for path in glob::expand_glob(pattern, &cwd)? {
            load_once(&path, registry, &mut loaded)?;
        }
    }

    let scenarios = registry.snapshot();
    logger::emit(ActivityEvent::ScenariosListed {
        count: scenarios.len(),
    });
    Ok(scenarios)
}

fn load_once(path: &Path, registry: &ScenarioRegistry, loaded: &mut HashSet<PathBuf>) -> Result<()> {
    if loaded.insert(path.to_path_buf()) {
        ScenarioManifest::load(path)?.register(registry)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct MatrixEntry<'a> {
    name: &'a str,
    command: String,
}

#[derive(Serialize)]
struct Matrix<'a> {
    include: Vec<MatrixEntry<'a>>,
    name: Vec<&'a str>,
}

/// One name per line, or with `matrix` a CI job matrix as compact JSON
/// (no trailing newline).
pub fn render_list(scenarios: &[Scenario], matrix: Option<&str>) -> Result<String> {
    let Some(template) = matrix else {
        return Ok(scenarios.iter().map(|s| format!("{}\n", s.name())).collect());
    };
    let doc = Matrix {
        include: scenarios
            .iter()
            .map(|s| MatrixEntry {
                name: s.name(),
                command: format_command(template, s.name()),
            })
            .collect(),
        name: scenarios.iter().map(Scenario::name).collect(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// printf-style substitution of a scenario name into a command template.
///
/// The first `%s` becomes `name` and `%%` becomes `%`. Without a `%s` the
/// name is appended after a space.
pub fn format_command(template: &str, name: &str) -> String {
    let mut out = String::with_capacity(template.len() + name.len() + 1);
    let mut substituted = false;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') if !substituted => {
                chars.next();
                out.push_str(name);
                substituted = true;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    if !substituted {
        out.push(' ');
        out.push_str(name);
    }
    out
}

/// Which scenario to write out, and where.
#[derive(Debug, Clone)]
pub struct OutputParams {
    pub list: ListParams,
    /// Substring of the scenario name.
    pub scenario: String,
    pub outdir: PathBuf,
    /// Remaining prepare settings; `outdir` always wins over any set here.
    pub prepare: PrepareOptions,
}

/// What [`output`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputReport {
    pub scenario: String,
    pub dir: PathBuf,
}

/// First scenario whose name contains `query`.
pub fn find_scenario<'a>(scenarios: &'a [Scenario], query: &str) -> Result<&'a Scenario> {
    scenarios
        .iter()
        .find(|s| s.name().contains(query))
        .ok_or_else(|| ScenarioError::NoMatchingScenario {
            query: query.to_string(),
        })
}

/// List, pick the first scenario matching `params.scenario`, and prepare it
/// into `params.outdir`.
pub fn output(params: &OutputParams, registry: &ScenarioRegistry) -> Result<OutputReport> {
    let scenarios = list(&params.list, registry)?;
    let scenario = find_scenario(&scenarios, &params.scenario)?;

    let outdir = if params.outdir.is_absolute() {
        params.outdir.clone()
    } else {
        params.list.cwd.join(&params.outdir)
    };
    let options = params.prepare.clone().outdir(&outdir);
    let app = scenario.prepare_with(&options)?;

    logger::emit(ActivityEvent::ScenarioWritten {
        scenario: scenario.name().to_string(),
        dir: app.dir().display().to_string(),
    });
    Ok(OutputReport {
        scenario: scenario.name().to_string(),
        dir: outdir,
    })
}
