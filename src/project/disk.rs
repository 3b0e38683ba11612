//! Reading fixture directories into memory and writing trees back out.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::NODE_MODULES;
use crate::project::tree::{DirTree, Entry};

/// Directory names never captured from a fixture.
const SKIPPED_DIRS: [&str; 2] = [NODE_MODULES, ".git"];

/// Capture every file below `root` (excluding installed packages and VCS
/// metadata). Symlinked files are read through; symlinked directories are
/// skipped so a link cycle cannot trap the walk.
pub fn read_tree(root: &Path) -> Result<DirTree> {
    let mut tree = DirTree::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && SKIPPED_DIRS.iter().any(|s| e.file_name() == *s))
        });

    for entry in walker {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        let path = entry.path();
        let is_file = if entry.file_type().is_symlink() {
            fs::metadata(path).is_ok_and(|m| m.is_file())
        } else {
            entry.file_type().is_file()
        };
        let rel_path = path.strip_prefix(root).unwrap_or(path);
        let Some(rel) = rel_path.to_str() else {
            return Err(ScenarioError::InvalidProjectPath {
                path: rel_path.to_string_lossy().into_owned(),
                reason: "file name is not valid UTF-8".to_string(),
            });
        };
        let rel = rel.replace('\\', "/");

        if is_file {
            let bytes = fs::read(path).map_err(|source| ScenarioError::io(path, source))?;
            tree.insert_file(&rel, bytes)?;
        } else if entry.file_type().is_dir() {
            tree.ensure_dir(&rel)?;
        }
    }
    Ok(tree)
}

fn walk_error(root: &Path, err: walkdir::Error) -> ScenarioError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
    ScenarioError::Io { path, source }
}

/// Write `tree` below `dir`, creating directories as needed. Existing files
/// are overwritten; unrelated files already present are left alone.
pub fn write_tree(dir: &Path, tree: &DirTree) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| ScenarioError::io(dir, source))?;
    for (name, entry) in tree.entries() {
        let target = dir.join(name);
        match entry {
            Entry::File(bytes) => {
                fs::write(&target, bytes).map_err(|source| ScenarioError::io(&target, source))?;
            }
            Entry::Dir(child) => write_tree(&target, child)?,
        }
    }
    Ok(())
}

/// Point `link` at `target`, replacing whatever is at `link` already.
pub fn replace_with_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|source| ScenarioError::io(parent, source))?;
    }

    match fs::symlink_metadata(link) {
        Ok(meta) if meta.is_dir() => {
            fs::remove_dir_all(link).map_err(|source| ScenarioError::io(link, source))?;
        }
        Ok(_) => remove_link(link)?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => return Err(ScenarioError::io(link, source)),
    }

    symlink_dir(target, link).map_err(|source| ScenarioError::io(link, source))
}

#[cfg(windows)]
fn remove_link(link: &Path) -> Result<()> {
    // Directory symlinks on Windows must be removed with remove_dir.
    fs::remove_file(link)
        .or_else(|_| fs::remove_dir(link))
        .map_err(|source| ScenarioError::io(link, source))
}

#[cfg(not(windows))]
fn remove_link(link: &Path) -> Result<()> {
    fs::remove_file(link).map_err(|source| ScenarioError::io(link, source))
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}
