//! Relative page references.
//!
//! A reference is resolved from the directory of the referring page, then
//! from each parent directory in turn, up to the content root:
//!
//! ```text
//! from a/b/c.md, "images/x":
//!   a/b/images/x  →  a/images/x  →  images/x  →  not found
//! ```
//!
//! A leading `/` resolves from the root only. `.` and `..` are normalized
//! before matching; a path climbing above the root never matches.
//!
//! At each candidate path, in order:
//! 1. a page whose key is the path
//! 2. a page whose output is `path/index.html` (directory or page index)
//! 3. a page whose output is the path itself
//! 4. a page in the same directory whose file name minus extension matches

use super::{INDEX_HTML, PageGraph, PageKey};
use crate::{meta::Value, scan::join_rel};
use std::ops::Bound;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("cannot resolve `{target}` from `{from}`")]
    NotFound { from: String, target: String },

    #[error("unknown page `{0}`")]
    UnknownPage(String),
}

impl PageGraph {
    /// Resolve `target` as seen from the page `from`.
    pub fn resolve(&self, from: &str, target: &str) -> Result<PageKey, ResolveError> {
        let page = self
            .pages
            .get(from)
            .ok_or_else(|| ResolveError::UnknownPage(from.to_owned()))?;
        let not_found = || ResolveError::NotFound {
            from: from.to_owned(),
            target: target.to_owned(),
        };

        if let Some(absolute) = target.strip_prefix('/') {
            return normalize("", absolute)
                .and_then(|path| self.find_at(&path))
                .ok_or_else(not_found);
        }

        let mut dir = page.source_dir();
        loop {
            if let Some(found) = normalize(dir, target).and_then(|path| self.find_at(&path)) {
                return Ok(found);
            }
            if dir.is_empty() {
                return Err(not_found());
            }
            dir = dir.rsplit_once('/').map_or("", |(parent, _)| parent);
        }
    }

    /// Resolve a metadata value: a page reference is checked, a string is
    /// resolved as a path.
    pub fn resolve_value(&self, from: &str, value: &Value) -> Result<PageKey, ResolveError> {
        match value {
            Value::Page(key) if self.contains(key.as_str()) => Ok(key.clone()),
            Value::String(target) => self.resolve(from, target),
            other => Err(ResolveError::NotFound {
                from: from.to_owned(),
                target: other.to_json().to_string(),
            }),
        }
    }

    fn find_at(&self, path: &str) -> Option<PageKey> {
        if let Some(page) = self.pages.get(path) {
            return Some(page.key.clone());
        }
        if let Some(key) = self.build_paths.get(&join_rel(path, INDEX_HTML)) {
            return Some(key.clone());
        }
        if let Some(key) = self.build_paths.get(path) {
            return Some(key.clone());
        }

        let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        self.pages
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .take_while(|(key, _)| key.as_str().starts_with(&prefix))
            .find(|(key, _)| key.dir() == dir && key.stem() == name)
            .map(|(key, _)| key.clone())
    }
}

/// Join `rel` onto `base`, folding `.` and `..`. `None` if it escapes the root.
pub fn normalize(base: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            name => parts.push(name),
        }
    }
    Some(parts.join("/"))
}
