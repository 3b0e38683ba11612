//! Shell-style glob patterns for locating scenario manifests.
//!
//! Supported syntax: `*` (within one path segment), `?` (one character),
//! `**` (any number of segments). Everything else matches literally.
//! Hidden entries are only matched when the pattern spells out the dot.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::core::errors::{Result, ScenarioError};
use crate::core::paths::resolve_absolute_path;

/// Compile a glob into an anchored regex over `/`-separated relative paths.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized = pattern.replace('\\', "/");
    let mut regex_str = String::with_capacity(normalized.len() * 2);
    regex_str.push('^');

    let chars: Vec<char> = normalized.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    regex_str.push_str("(?:[^/]*/)*");
                    i += 3;
                } else {
                    regex_str.push_str(".*");
                    i += 2;
                }
            }
            '*' => {
                regex_str.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                regex_str.push_str("[^/]");
                i += 1;
            }
            c => {
                regex_str.push_str(&regex::escape(c.encode_utf8(&mut [0_u8; 4])));
                i += 1;
            }
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| ScenarioError::InvalidPattern {
        pattern: pattern.to_string(),
        details: err.to_string(),
    })
}

fn has_wildcard(segment: &str) -> bool {
    segment.contains(['*', '?'])
}

/// Files matching `pattern`, resolved against `cwd` when relative, sorted by
/// path. A pattern without wildcards names one file; if that file does not
/// exist the result is empty.
pub fn expand_glob(pattern: &str, cwd: &Path) -> Result<Vec<PathBuf>> {
    if pattern.trim().is_empty() {
        return Err(ScenarioError::InvalidPattern {
            pattern: pattern.to_string(),
            details: "empty pattern".to_string(),
        });
    }

    let normalized = pattern.replace('\\', "/");
    let absolute = Path::new(&normalized).is_absolute();
    let segments: Vec<&str> = normalized.split('/').collect();
    let split = segments
        .iter()
        .position(|s| has_wildcard(s))
        .unwrap_or(segments.len());

    let literal = segments[..split].join("/");
    let base = match (literal.is_empty(), absolute) {
        (true, true) => PathBuf::from("/"),
        (true, false) => cwd.to_path_buf(),
        (false, true) => PathBuf::from(&literal),
        (false, false) => cwd.join(&literal),
    };
    let base = resolve_absolute_path(&base);

    if split == segments.len() {
        return Ok(if base.is_file() { vec![base] } else { Vec::new() });
    }
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let rest = segments[split..].join("/");
    let matcher = glob_to_regex(&rest)?;
    let allow_hidden = segments[split..].iter().any(|s| s.starts_with('.'));

    let mut matches = Vec::new();
    let walker = WalkDir::new(&base)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            allow_hidden || e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
        });
    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(&base).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
            ScenarioError::Io { path, source }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&base)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if matcher.is_match(&rel) {
            matches.push(entry.into_path());
        }
    }
    matches.sort();
    Ok(matches)
}
