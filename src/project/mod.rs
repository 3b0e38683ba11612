//! In-memory project model: the codebase a scenario starts from and mutates.
//!
//! A [`Project`] holds a package manifest (`package.json`), a tree of files,
//! and a set of linked packages that become `node_modules/<name>` symlinks.
//! Nothing touches the filesystem until [`Project::write`].

#![allow(missing_docs)]

pub mod disk;
pub mod tree;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::TempDir;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::{
    NODE_MODULES, resolve_absolute_path, resolve_package_dir, split_project_path,
};

pub use tree::{DirTree, Entry};

const MANIFEST_FILE: &str = "package.json";

/// Whether a fixture directory is an application or a library. This only
/// decides which dependency sections are linked by [`Project::from_dir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Link `dependencies` and `devDependencies`.
    #[default]
    App,
    /// Link `dependencies` only.
    Lib,
}

/// Manifest section a linked package is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Regular,
    Dev,
}

impl DependencyKind {
    const fn manifest_key(self) -> &'static str {
        match self {
            Self::Regular => "dependencies",
            Self::Dev => "devDependencies",
        }
    }
}

/// Where to resolve a linked package from.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    /// Directory to start the `node_modules` lookup from.
    pub base_dir: PathBuf,
    /// Installed package to link, when it differs from the dependency name.
    pub resolve_name: Option<String>,
}

impl LinkOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            resolve_name: None,
        }
    }

    #[must_use]
    pub fn resolve_name(mut self, name: impl Into<String>) -> Self {
        self.resolve_name = Some(name.into());
        self
    }
}

/// A package linked into the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedPackage {
    pub target: PathBuf,
    pub kind: DependencyKind,
}

/// How the temporary directory is allocated when no base dir is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempOptions {
    pub prefix: String,
    /// Leave the directory behind instead of deleting it on drop.
    pub keep: bool,
}

impl Default for TempOptions {
    fn default() -> Self {
        Self {
            prefix: "scenario-".to_string(),
            keep: false,
        }
    }
}

/// Mutable in-memory codebase.
#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    version: String,
    manifest: Map<String, Value>,
    files: DirTree,
    links: BTreeMap<String, LinkedPackage>,
    base_dir: Option<PathBuf>,
    temp_options: TempOptions,
    temp_guard: Option<Arc<TempDir>>,
}

impl Project {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            manifest: Map::new(),
            files: DirTree::new(),
            links: BTreeMap::new(),
            base_dir: None,
            temp_options: TempOptions::default(),
            temp_guard: None,
        }
    }

    /// Build a project from an existing file tree.
    pub fn with_files(name: impl Into<String>, version: impl Into<String>, files: DirTree) -> Self {
        let mut project = Self::new(name, version);
        project.files = files;
        project
    }

    /// Capture a fixture directory into memory.
    ///
    /// `package.json` supplies name, version and the remaining manifest fields.
    /// Declared dependencies are linked to wherever node would resolve them
    /// from `dir`, per `kind`. Installed packages are never copied.
    pub fn from_dir(dir: &Path, kind: ProjectKind) -> Result<Self> {
        let root = resolve_absolute_path(dir);
        if !root.is_dir() {
            return Err(ScenarioError::io(
                &root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "fixture directory not found"),
            ));
        }

        let mut files = disk::read_tree(&root)?;
        let mut manifest = match files.remove(MANIFEST_FILE)? {
            Some(Entry::File(bytes)) => {
                parse_manifest(&bytes, &root.join(MANIFEST_FILE).display().to_string())?
            }
            _ => Map::new(),
        };

        let fallback_name = root
            .file_name()
            .map_or_else(|| "project".to_string(), |n| n.to_string_lossy().into_owned());
        let name = take_string(&mut manifest, "name").unwrap_or(fallback_name);
        let version = take_string(&mut manifest, "version").unwrap_or_else(|| "0.0.0".to_string());

        let mut project = Self::with_files(name, version, files);
        project.manifest = manifest;

        let mut sections = vec![DependencyKind::Regular];
        if kind == ProjectKind::App {
            sections.push(DependencyKind::Dev);
        }
        for section in sections {
            for dep in project.declared_dependencies(section) {
                let target = resolve_package_dir(&root, &dep)?;
                project.links.insert(dep, LinkedPackage {
                    target,
                    kind: section,
                });
            }
        }
        Ok(project)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// Manifest fields other than `name` and `version`.
    pub fn manifest(&self) -> &Map<String, Value> {
        &self.manifest
    }

    pub fn manifest_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.manifest
    }

    pub fn files(&self) -> &DirTree {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut DirTree {
        &mut self.files
    }

    /// Add or replace a file. Writing the root `package.json` replaces the
    /// manifest (name, version and remaining fields) instead of adding a file.
    pub fn write_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> Result<()> {
        if is_root_manifest(path)? {
            return self.replace_manifest(&contents.into(), path);
        }
        self.files.insert_file(path, contents)
    }

    fn replace_manifest(&mut self, bytes: &[u8], origin: &str) -> Result<()> {
        let mut manifest = parse_manifest(bytes, origin)?;
        if let Some(name) = take_string(&mut manifest, "name") {
            self.name = name;
        }
        if let Some(version) = take_string(&mut manifest, "version") {
            self.version = version;
        }
        self.manifest = manifest;
        Ok(())
    }

    /// UTF-8 contents of a file, if present.
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).and_then(Entry::as_str)
    }

    pub fn remove(&mut self, path: &str) -> Result<Option<Entry>> {
        self.files.remove(path)
    }

    /// Declare a dependency with an explicit version range.
    pub fn add_dependency(&mut self, name: &str, range: &str) {
        if let Some(section) = section_mut(&mut self.manifest, DependencyKind::Regular) {
            section.insert(name.to_string(), Value::String(range.to_string()));
        }
    }

    pub fn add_dev_dependency(&mut self, name: &str, range: &str) {
        if let Some(section) = section_mut(&mut self.manifest, DependencyKind::Dev) {
            section.insert(name.to_string(), Value::String(range.to_string()));
        }
    }

    /// Link an installed package in as `name`, resolving it from
    /// `options.base_dir`. Replaces any earlier link with the same name.
    pub fn link_dependency(&mut self, name: &str, options: &LinkOptions) -> Result<()> {
        self.link(name, options, DependencyKind::Regular)
    }

    pub fn link_dev_dependency(&mut self, name: &str, options: &LinkOptions) -> Result<()> {
        self.link(name, options, DependencyKind::Dev)
    }

    fn link(&mut self, name: &str, options: &LinkOptions, kind: DependencyKind) -> Result<()> {
        let lookup = options.resolve_name.as_deref().unwrap_or(name);
        let target = resolve_package_dir(&options.base_dir, lookup)?;
        self.links
            .insert(name.to_string(), LinkedPackage { target, kind });
        Ok(())
    }

    pub fn linked_packages(&self) -> &BTreeMap<String, LinkedPackage> {
        &self.links
    }

    /// Directory the project writes to, once known.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Write to `dir` instead of an auto-allocated temporary directory.
    pub fn set_base_dir(&mut self, dir: impl AsRef<Path>) {
        self.base_dir = Some(resolve_absolute_path(dir.as_ref()));
        self.temp_guard = None;
    }

    pub fn set_temp_options(&mut self, options: TempOptions) {
        self.temp_options = options;
    }

    /// Handle keeping the auto-allocated temporary directory alive.
    pub fn temp_guard(&self) -> Option<Arc<TempDir>> {
        self.temp_guard.clone()
    }

    /// The manifest as it will be written, with linked packages merged into
    /// their dependency sections.
    pub fn package_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("name".to_string(), Value::String(self.name.clone()));
        out.insert("version".to_string(), Value::String(self.version.clone()));
        for (key, value) in &self.manifest {
            out.insert(key.clone(), value.clone());
        }
        for (name, link) in &self.links {
            if let Some(section) = section_mut(&mut out, link.kind) {
                if !section.contains_key(name) {
                    section.insert(name.clone(), Value::String(installed_version(&link.target)));
                }
            }
        }
        Value::Object(out)
    }

    /// Materialize the project into its base directory and return that
    /// directory. A temporary directory is allocated when none is set.
    pub fn write(&mut self) -> Result<PathBuf> {
        let dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => self.allocate_temp_dir()?,
        };

        // A manifest placed through `files_mut` still wins over the model.
        match self.files.remove(MANIFEST_FILE)? {
            Some(Entry::File(bytes)) => self.replace_manifest(&bytes, MANIFEST_FILE)?,
            Some(Entry::Dir(_)) => {
                return Err(ScenarioError::InvalidProjectPath {
                    path: MANIFEST_FILE.to_string(),
                    reason: "is reserved for the package manifest".to_string(),
                });
            }
            None => {}
        }

        disk::write_tree(&dir, &self.files)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let mut rendered = serde_json::to_string_pretty(&self.package_json())?;
        rendered.push('\n');
        fs::write(&manifest_path, rendered)
            .map_err(|source| ScenarioError::io(&manifest_path, source))?;

        let node_modules = dir.join(NODE_MODULES);
        for (name, link) in &self.links {
            disk::replace_with_symlink(&link.target, &node_modules.join(name))?;
        }
        Ok(dir)
    }

    fn allocate_temp_dir(&mut self) -> Result<PathBuf> {
        let temp = tempfile::Builder::new()
            .prefix(&self.temp_options.prefix)
            .tempdir()
            .map_err(|source| ScenarioError::io(std::env::temp_dir(), source))?;
        let dir = resolve_absolute_path(temp.path());
        if self.temp_options.keep {
            let _ = temp.into_path();
        } else {
            self.temp_guard = Some(Arc::new(temp));
        }
        self.base_dir = Some(dir.clone());
        Ok(dir)
    }

    fn declared_dependencies(&self, kind: DependencyKind) -> Vec<String> {
        self.manifest
            .get(kind.manifest_key())
            .and_then(Value::as_object)
            .map(|deps| deps.keys().cloned().collect())
            .unwrap_or_default()
    }
}

fn is_root_manifest(path: &str) -> Result<bool> {
    let segments = split_project_path(path)?;
    Ok(segments.len() == 1 && segments[0] == MANIFEST_FILE)
}

fn parse_manifest(bytes: &[u8], origin: &str) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(manifest) => Ok(manifest),
        _ => Err(ScenarioError::Serialization {
            context: "package.json",
            details: format!("{origin} is not a JSON object"),
        }),
    }
}

fn take_string(manifest: &mut Map<String, Value>, key: &str) -> Option<String> {
    match manifest.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// The dependency section of `kind`, replacing a malformed (non-object) one.
fn section_mut(
    manifest: &mut Map<String, Value>,
    kind: DependencyKind,
) -> Option<&mut Map<String, Value>> {
    let slot = manifest
        .entry(kind.manifest_key())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    slot.as_object_mut()
}

/// Version declared by an installed package, or `*` when it has none.
fn installed_version(package_dir: &Path) -> String {
    fs::read(package_dir.join(MANIFEST_FILE))
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .and_then(|v| v.get("version").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "*".to_string())
}
