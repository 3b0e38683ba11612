//! In-memory directory tree backing a [`Project`](super::Project).

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::split_project_path;

/// A node in the tree: file contents or a nested directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(Vec<u8>),
    Dir(DirTree),
}

impl Entry {
    /// File contents, if this is a file.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::File(bytes) => Some(bytes),
            Self::Dir(_) => None,
        }
    }

    /// File contents as UTF-8, if this is a file with valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Directory listing keyed by entry name. Iteration order is lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirTree {
    entries: BTreeMap<String, Entry>,
}

impl DirTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> btree_map::Iter<'_, String, Entry> {
        self.entries.iter()
    }

    /// Write a file at a `/`-separated relative path, creating parent
    /// directories. An existing entry at that path is replaced.
    pub fn insert_file(&mut self, path: &str, contents: impl Into<Vec<u8>>) -> Result<()> {
        let mut segments = split_project_path(path)?;
        let name = segments.pop().unwrap_or_default();
        let parent = self.dir_mut_creating(path, &segments)?;
        parent.entries.insert(name, Entry::File(contents.into()));
        Ok(())
    }

    /// Create (or return) the directory at `path`.
    pub fn ensure_dir(&mut self, path: &str) -> Result<&mut Self> {
        let segments = split_project_path(path)?;
        self.dir_mut_creating(path, &segments)
    }

    /// Look up an entry. Invalid paths simply yield `None`.
    pub fn get(&self, path: &str) -> Option<&Entry> {
        let segments = split_project_path(path).ok()?;
        let (last, parents) = segments.split_last()?;
        let mut dir = self;
        for segment in parents {
            match dir.entries.get(segment)? {
                Entry::Dir(child) => dir = child,
                Entry::File(_) => return None,
            }
        }
        dir.entries.get(last)
    }

    /// Remove an entry, returning it if it existed.
    pub fn remove(&mut self, path: &str) -> Result<Option<Entry>> {
        let segments = split_project_path(path)?;
        let Some((last, parents)) = segments.split_last() else {
            return Ok(None);
        };
        let mut dir = self;
        for segment in parents {
            match dir.entries.get_mut(segment) {
                Some(Entry::Dir(child)) => dir = child,
                _ => return Ok(None),
            }
        }
        Ok(dir.entries.remove(last))
    }

    /// Every file in the tree as `(relative_path, contents)`, depth first in
    /// name order.
    pub fn files(&self) -> Vec<(String, &[u8])> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    fn collect_files<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a [u8])>) {
        for (name, entry) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match entry {
                Entry::File(bytes) => out.push((path, bytes)),
                Entry::Dir(child) => child.collect_files(&path, out),
            }
        }
    }

    fn dir_mut_creating(&mut self, full: &str, segments: &[String]) -> Result<&mut Self> {
        let mut dir = self;
        for segment in segments {
            let entry = dir
                .entries
                .entry(segment.clone())
                .or_insert_with(|| Entry::Dir(Self::new()));
            dir = match entry {
                Entry::Dir(child) => child,
                Entry::File(_) => {
                    return Err(ScenarioError::InvalidProjectPath {
                        path: full.to_string(),
                        reason: format!("{segment} is a file, not a directory"),
                    });
                }
            };
        }
        Ok(dir)
    }
}
