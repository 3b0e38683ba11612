//! Declarative scenario definitions stored as TOML.
//!
//! A manifest describes one base project, its variants and the skip / only /
//! map refinements applied to them. Loading a manifest builds a [`Scenarios`]
//! tree through the regular builder API.
//!
//! ```toml
//! [base]
//! dir = "fixtures/app"
//! kind = "app"
//!
//! [[variants]]
//! name = "hello1"
//! steps = [{ op = "link_dependency", name = "hello", base_dir = "fixtures", resolve_name = "hello1" }]
//!
//! [[map]]
//! name = "ts"
//! steps = [{ op = "write_file", path = "tsconfig.json", contents = "{}" }]
//! ```

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::resolve_absolute_path;
use crate::project::{LinkOptions, Project, ProjectKind};
use crate::scenario::{ScenarioRegistry, Scenarios, mutator};

fn default_version() -> String {
    "0.0.0".to_string()
}

/// Parsed manifest file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioManifest {
    pub base: BaseSpec,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub only: Option<String>,
    #[serde(default)]
    pub map: Vec<VariantSpec>,
    #[serde(skip)]
    source: PathBuf,
}

/// Where the base project comes from: a fixture directory or inline files.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseSpec {
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub kind: ProjectKind,
    pub project: Option<InlineProject>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineProject {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// A named list of steps; used for both `[[variants]]` and `[[map]]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSpec {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One project edit.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    WriteFile {
        path: String,
        contents: String,
    },
    Remove {
        path: String,
    },
    LinkDependency {
        name: String,
        base_dir: PathBuf,
        resolve_name: Option<String>,
    },
    LinkDevDependency {
        name: String,
        base_dir: PathBuf,
        resolve_name: Option<String>,
    },
    /// Set a top-level `package.json` field.
    SetField {
        key: String,
        value: Value,
    },
}

impl Step {
    pub fn apply(&self, project: &mut Project) -> Result<()> {
        match self {
            Self::WriteFile { path, contents } => project.write_file(path, contents.as_str()),
            Self::Remove { path } => project.remove(path).map(|_| ()),
            Self::LinkDependency {
                name,
                base_dir,
                resolve_name,
            } => project.link_dependency(name, &link_options(base_dir, resolve_name.as_deref())),
            Self::LinkDevDependency {
                name,
                base_dir,
                resolve_name,
            } => {
                project.link_dev_dependency(name, &link_options(base_dir, resolve_name.as_deref()))
            }
            Self::SetField { key, value } => {
                match (key.as_str(), value) {
                    ("name", Value::String(name)) => project.set_name(name.as_str()),
                    ("version", Value::String(version)) => project.set_version(version.as_str()),
                    _ => {
                        project.manifest_mut().insert(key.clone(), value.clone());
                    }
                }
                Ok(())
            }
        }
    }

    fn resolve_paths(&mut self, root: &Path) {
        match self {
            Self::LinkDependency { base_dir, .. } | Self::LinkDevDependency { base_dir, .. } => {
                *base_dir = resolve_against(root, base_dir);
            }
            _ => {}
        }
    }
}

fn link_options(base_dir: &Path, resolve_name: Option<&str>) -> LinkOptions {
    let options = LinkOptions::new(base_dir);
    match resolve_name {
        Some(name) => options.resolve_name(name),
        None => options,
    }
}

fn apply_all(steps: &[Step], project: &mut Project) -> Result<()> {
    for step in steps {
        step.apply(project)?;
    }
    Ok(())
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        resolve_absolute_path(path)
    } else {
        resolve_absolute_path(&root.join(path))
    }
}

impl ScenarioManifest {
    /// Read and parse a manifest; relative paths inside it are taken
    /// relative to the manifest's own directory.
    pub fn load(path: &Path) -> Result<Self> {
        let path = resolve_absolute_path(path);
        let raw = fs::read_to_string(&path).map_err(|source| ScenarioError::io(&path, source))?;
        Self::parse(&raw, &path)
    }

    /// Parse manifest text as if it had been read from `path`.
    pub fn parse(raw: &str, path: &Path) -> Result<Self> {
        let mut manifest: Self = toml::from_str(raw).map_err(|err| ScenarioError::Manifest {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;
        manifest.source = path.to_path_buf();

        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        if let Some(dir) = &manifest.base.dir {
            manifest.base.dir = Some(resolve_against(&root, dir));
        }
        for spec in manifest.variants.iter_mut().chain(manifest.map.iter_mut()) {
            for step in &mut spec.steps {
                step.resolve_paths(&root);
            }
        }
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    fn invalid(&self, details: impl Into<String>) -> ScenarioError {
        ScenarioError::Manifest {
            path: self.source.clone(),
            details: details.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        match (&self.base.dir, &self.base.project) {
            (Some(_), Some(_)) => {
                return Err(self.invalid("[base] takes either dir or project, not both"));
            }
            (None, None) => return Err(self.invalid("[base] needs a dir or a project")),
            _ => {}
        }
        if let Some(spec) = self
            .variants
            .iter()
            .chain(self.map.iter())
            .find(|spec| spec.name.trim().is_empty())
        {
            return Err(self.invalid(format!(
                "variant names must not be empty ({} step(s) unnamed)",
                spec.steps.len()
            )));
        }
        Ok(())
    }

    /// Build the scenario tree this manifest describes.
    pub fn build(&self) -> Result<Scenarios> {
        let mut tree = match (&self.base.dir, &self.base.project) {
            (Some(dir), _) => Scenarios::from_dir(dir.clone(), self.base.kind),
            (None, Some(inline)) => {
                let inline = inline.clone();
                Scenarios::from_project(move || {
                    let mut project = Project::new(&inline.name, &inline.version);
                    for (path, contents) in &inline.files {
                        project.write_file(path, contents.as_str())?;
                    }
                    Ok(project)
                })
            }
            (None, None) => return Err(self.invalid("[base] needs a dir or a project")),
        };

        if !self.variants.is_empty() {
            tree = tree.expand(self.variants.iter().map(|spec| {
                let steps = spec.steps.clone();
                (
                    spec.name.clone(),
                    mutator(move |project| apply_all(&steps, project)),
                )
            }));
        }
        for name in &self.skip {
            tree = tree.skip(name)?;
        }
        if let Some(name) = &self.only {
            tree = tree.only(name)?;
        }
        for spec in &self.map {
            let steps = spec.steps.clone();
            tree = tree.map(&spec.name, move |project| apply_all(&steps, project));
        }
        Ok(tree)
    }

    /// Build and enumerate into `registry`. Returns how many scenarios were
    /// recorded.
    pub fn register(&self, registry: &ScenarioRegistry) -> Result<usize> {
        let mut count = 0;
        self.build()?
            .for_each_scenario_in(registry, |_| count += 1);
        Ok(count)
    }
}
