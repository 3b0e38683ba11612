//! Path helpers shared by the project model, the listing layer, and the CLI.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::core::errors::{Result, ScenarioError};

/// Directory name under which linked packages are materialized.
pub const NODE_MODULES: &str = "node_modules";

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized. Paths that do not exist yet (an output
/// directory about to be created, for instance) are joined onto the current
/// directory and normalized syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

/// Split a project-relative path (`lib/index.js`) into its segments.
///
/// Backslashes are accepted as separators. Absolute paths, `..` segments and
/// empty paths are rejected so a mutator can never write outside the project.
pub fn split_project_path(path: &str) -> Result<Vec<String>> {
    let normalized = path.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(invalid(path, "must be relative"));
    }

    if has_drive_prefix(&normalized) {
        return Err(invalid(path, "must not contain a drive prefix"));
    }

    let mut segments = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid(path, "must not contain '..'")),
            s => segments.push(s.to_string()),
        }
    }

    if segments.is_empty() {
        return Err(invalid(path, "must name a file or directory"));
    }
    Ok(segments)
}

/// `C:` or `C:foo` at the start of a path. Only meaningful on Windows; a
/// colon is an ordinary file name character elsewhere.
#[cfg(windows)]
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(not(windows))]
fn has_drive_prefix(_path: &str) -> bool {
    false
}

fn invalid(path: &str, reason: &str) -> ScenarioError {
    ScenarioError::InvalidProjectPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Locate an installed package the way node's resolver does: look for
/// `node_modules/<name>` in `from` and then in every ancestor directory.
///
/// Scoped names (`@scope/pkg`) map onto nested directories.
pub fn find_package_dir(from: &Path, name: &str) -> Option<PathBuf> {
    let start = resolve_absolute_path(from);
    start
        .ancestors()
        .map(|dir| dir.join(NODE_MODULES).join(name))
        .find(|candidate| candidate.is_dir())
        .map(|found| resolve_absolute_path(&found))
}

/// Same as [`find_package_dir`] but fails with `UnresolvedDependency`.
pub fn resolve_package_dir(from: &Path, name: &str) -> Result<PathBuf> {
    find_package_dir(from, name).ok_or_else(|| ScenarioError::UnresolvedDependency {
        name: name.to_string(),
        from: from.to_path_buf(),
    })
}
