//! Content scanning.
//!
//! One walk over the content tree produces a [`DirTree`]: a record per
//! directory (declared metadata, ignore rules, per-file overrides) holding
//! the [`SourceFile`]s found in it. No document body is read here.
//!
//! # Declaration file
//!
//! A directory may contain a `.folio` file (JSON, YAML, or TOML):
//!
//! ```yaml
//! author: Alice          # plain keys: directory metadata
//! ignore: ["*.tmp"]      # replaces the inherited ignore list
//! asset: true            # every file below is copied verbatim
//! skip: true             # leave this directory out entirely
//! files:
//!   "*.draft.md": { draft: true }
//! dirs:
//!   "20*": { template: archive.html }
//! ```
//!
//! # Walk order
//!
//! Entries are visited depth-first in file-name order, so a directory record
//! is always created before the records of its subdirectories. Stages that
//! need parents first iterate [`DirTree::iter`] in that order.

pub mod pattern;

pub use pattern::Pattern;

use crate::{
    log,
    meta::{MetaTable, Value, front_matter},
    site::{BuildError, BuildReport},
};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Name of the per-directory declaration file.
pub const DECLARATION_FILE: &str = ".folio";

/// Declaration keys consumed by the scanner rather than stored as metadata.
const SCANNER_KEYS: &[&str] = &["files", "dirs", "ignore", "skip", "asset"];

// ============================================================================
// Types
// ============================================================================

/// Index of a directory record in its [`DirTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirId(usize);

impl DirId {
    pub const ROOT: DirId = DirId(0);
}

/// A file discovered by the scanner.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the content root, `/`-separated.
    pub rel: String,
    pub abs: PathBuf,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    /// Overrides from the parent's `files` patterns, in declaration order.
    pub meta: MetaTable,
}

impl SourceFile {
    pub fn name(&self) -> &str {
        self.rel.rsplit('/').next().unwrap_or(&self.rel)
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        name.rsplit_once('.')
            .filter(|(stem, _)| !stem.is_empty())
            .map(|(_, ext)| ext)
    }
}

/// Default metadata and scanning rules for one directory.
#[derive(Debug, Clone)]
pub struct DirRecord {
    pub id: DirId,
    /// Path relative to the content root; empty for the root.
    pub path: String,
    pub abs: PathBuf,
    pub parent: Option<DirId>,
    pub meta: MetaTable,
    /// Effective ignore rules: own declaration, else inherited verbatim.
    pub ignore: Vec<Pattern>,
    pub file_rules: Vec<(Pattern, MetaTable)>,
    pub dir_rules: Vec<(Pattern, MetaTable)>,
    /// Every file below is an asset.
    pub asset: bool,
    pub files: Vec<SourceFile>,
    pub subdirs: Vec<DirId>,
}

impl DirRecord {
    /// Last path component; empty for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|p| p.is_match(name))
    }

    pub fn file(&self, name: &str) -> Option<&SourceFile> {
        self.files.iter().find(|f| f.name() == name)
    }
}

/// All directory records of one scan, parents before children.
#[derive(Debug, Clone, Default)]
pub struct DirTree {
    dirs: Vec<DirRecord>,
    by_path: FxHashMap<String, DirId>,
}

impl DirTree {
    pub fn root(&self) -> &DirRecord {
        &self.dirs[0]
    }

    pub fn get(&self, id: DirId) -> &DirRecord {
        &self.dirs[id.0]
    }

    pub fn get_mut(&mut self, id: DirId) -> &mut DirRecord {
        &mut self.dirs[id.0]
    }

    pub fn find(&self, path: &str) -> Option<DirId> {
        self.by_path.get(path).copied()
    }

    /// Records in creation order: every parent precedes its children.
    pub fn iter(&self) -> impl Iterator<Item = &DirRecord> {
        self.dirs.iter()
    }

    pub fn ids(&self) -> impl DoubleEndedIterator<Item = DirId> + use<> {
        (0..self.dirs.len()).map(DirId)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn file_count(&self) -> usize {
        self.dirs.iter().map(|d| d.files.len()).sum()
    }

    /// The record itself, then each ancestor up to the root.
    pub fn ancestors(&self, id: DirId) -> impl Iterator<Item = &DirRecord> {
        std::iter::successors(self.dirs.get(id.0), |d| {
            d.parent.and_then(|p| self.dirs.get(p.0))
        })
    }

    /// First value of `key` found climbing from `id` to the root.
    pub fn lookup(&self, id: DirId, key: &str) -> Option<&Value> {
        self.ancestors(id).find_map(|d| d.meta.get(key))
    }

    /// Nearest existing record for a relative path, climbing towards the root.
    pub fn nearest(&self, path: &str) -> DirId {
        let mut path = path.trim_matches('/');
        loop {
            if let Some(id) = self.find(path) {
                return id;
            }
            match path.rsplit_once('/') {
                Some((parent, _)) => path = parent,
                None if !path.is_empty() => path = "",
                None => return DirId::ROOT,
            }
        }
    }

    fn push(&mut self, mut record: DirRecord) -> DirId {
        let id = DirId(self.dirs.len());
        record.id = id;
        if let Some(parent) = record.parent {
            self.dirs[parent.0].subdirs.push(id);
        }
        self.by_path.insert(record.path.clone(), id);
        self.dirs.push(record);
        id
    }

    #[cfg(test)]
    pub fn single(meta: MetaTable) -> Self {
        let mut tree = Self::default();
        tree.push(DirRecord::new(String::new(), PathBuf::new(), None, meta));
        tree
    }

    #[cfg(test)]
    pub fn add_dir(&mut self, path: &str, meta: MetaTable) -> DirId {
        let parent = match path.rsplit_once('/') {
            Some((parent, _)) => self.find(parent).unwrap_or(DirId::ROOT),
            None => DirId::ROOT,
        };
        self.push(DirRecord::new(path.into(), PathBuf::from(path), Some(parent), meta))
    }

    #[cfg(test)]
    pub fn add_file(&mut self, id: DirId, rel: &str) {
        self.get_mut(id).files.push(SourceFile {
            rel: rel.into(),
            abs: PathBuf::from(rel),
            size: 0,
            mtime: DateTime::UNIX_EPOCH,
            meta: MetaTable::new(),
        });
    }
}

impl DirRecord {
    fn new(path: String, abs: PathBuf, parent: Option<DirId>, meta: MetaTable) -> Self {
        Self {
            id: DirId::ROOT,
            path,
            abs,
            parent,
            meta,
            ignore: Vec::new(),
            file_rules: Vec::new(),
            dir_rules: Vec::new(),
            asset: false,
            files: Vec::new(),
            subdirs: Vec::new(),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Walk `root` once and build the directory tree.
///
/// `defaults` seeds the root record (site-wide metadata from the config).
/// Fails only when the root itself cannot be read; every other problem is
/// recorded in `report` and the entry is skipped.
pub fn scan(root: &Path, defaults: MetaTable, report: &BuildReport) -> Result<DirTree, BuildError> {
    fs::read_dir(root).map_err(|source| BuildError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut tree = DirTree::default();
    let mut root_record = DirRecord::new(String::new(), root.to_path_buf(), None, defaults);
    if apply_declaration(&mut root_record, report) == Visit::Skip {
        report.warn("", "the content root cannot be skipped; `skip` ignored");
    }
    tree.push(root_record);

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| relative(root, p))
                    .unwrap_or_default();
                let message = if err.loop_ancestor().is_some() {
                    "symlink loop".to_owned()
                } else if err.io_error().is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound) {
                    "broken symlink".to_owned()
                } else {
                    format!("unreadable: {err}")
                };
                report.warn(path, message);
                continue;
            }
        };

        let rel = relative(root, entry.path());
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_dir();
        let parent_path = rel.rsplit_once('/').map_or("", |(p, _)| p);
        let Some(parent_id) = tree.find(parent_path) else {
            continue;
        };

        if name.starts_with('.') || tree.get(parent_id).is_ignored(&name) {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        if is_dir {
            let parent = tree.get(parent_id);
            let mut record = DirRecord::new(
                rel.clone(),
                entry.path().to_path_buf(),
                Some(parent_id),
                MetaTable::new(),
            );
            record.ignore = parent.ignore.clone();
            record.asset = parent.asset;
            for (pattern, meta) in &parent.dir_rules {
                if pattern.is_match(&name) {
                    record.meta.merge_from(meta);
                }
            }
            if apply_declaration(&mut record, report) == Visit::Skip {
                walker.skip_current_dir();
                continue;
            }
            tree.push(record);
            continue;
        }

        let stat = match entry.metadata() {
            Ok(stat) => stat,
            Err(err) => {
                report.warn(rel, format!("unreadable: {err}"));
                continue;
            }
        };
        let parent = tree.get(parent_id);
        let mut meta = MetaTable::new();
        for (pattern, rule) in &parent.file_rules {
            if pattern.is_match(&name) {
                meta.merge_from(rule);
            }
        }
        let mtime = stat
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::UNIX_EPOCH);
        tree.get_mut(parent_id).files.push(SourceFile {
            rel,
            abs: entry.path().to_path_buf(),
            size: stat.len(),
            mtime,
            meta,
        });
    }

    log!("scan"; "{} directories, {} files", tree.len(), tree.file_count());
    Ok(tree)
}

// ============================================================================
// Internal
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Visit {
    Enter,
    Skip,
}

/// Read the record's declaration file, if any, and fold it into the record.
fn apply_declaration(record: &mut DirRecord, report: &BuildReport) -> Visit {
    let path = record.abs.join(DECLARATION_FILE);
    let display = join_rel(&record.path, DECLARATION_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Visit::Enter,
        Err(err) => {
            report.warn(display, format!("unreadable: {err}"));
            return Visit::Enter;
        }
    };
    let mut declared = match front_matter::parse_sniffed(&text) {
        Ok(declared) => declared,
        Err(err) => {
            report.warn(display, err.to_string());
            return Visit::Enter;
        }
    };

    if declared.get_bool("skip") == Some(true) {
        return Visit::Skip;
    }
    if let Some(asset) = declared.get_bool("asset") {
        record.asset = asset;
    }
    if let Some(ignore) = declared.get("ignore") {
        record.ignore = compile_all(ignore.string_items(), &display, report);
    }
    if let Some(rules) = declared.get_table("files") {
        record.file_rules = compile_rules(rules, &display, report);
    }
    if let Some(rules) = declared.get_table("dirs") {
        record.dir_rules = compile_rules(rules, &display, report);
    }

    for key in SCANNER_KEYS {
        declared.remove(key);
    }
    record.meta.merge_from(&declared);
    Visit::Enter
}

fn compile_all(patterns: Vec<&str>, origin: &str, report: &BuildReport) -> Vec<Pattern> {
    patterns
        .into_iter()
        .filter_map(|p| match Pattern::compile(p) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                report.warn(origin, format!("invalid pattern `{p}`: {err}"));
                None
            }
        })
        .collect()
}

fn compile_rules(rules: &MetaTable, origin: &str, report: &BuildReport) -> Vec<(Pattern, MetaTable)> {
    rules
        .iter()
        .filter_map(|(pattern, value)| {
            let Some(meta) = value.as_table() else {
                report.warn(origin, format!("rule `{pattern}` is not a table"));
                return None;
            };
            match Pattern::compile(pattern) {
                Ok(compiled) => Some((compiled, meta.clone())),
                Err(err) => {
                    report.warn(origin, format!("invalid pattern `{pattern}`: {err}"));
                    None
                }
            }
        })
        .collect()
}

/// `/`-separated path of `path` relative to `root`.
fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join two relative `/` paths where either may be empty.
pub fn join_rel(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_owned(),
        (false, true) => dir.to_owned(),
        (false, false) => format!("{dir}/{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scan_quiet(root: &Path) -> (DirTree, BuildReport) {
        let report = BuildReport::quiet();
        let mut defaults = MetaTable::new();
        defaults.set("site_name", "Test");
        let tree = scan(root, defaults, &report).unwrap();
        (tree, report)
    }

    fn file_names(tree: &DirTree, dir: &str) -> Vec<String> {
        let id = tree.find(dir).unwrap();
        tree.get(id).files.iter().map(|f| f.rel.clone()).collect()
    }

    #[test]
    fn test_scan_builds_tree_in_depth_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.md", "# Home");
        write(dir.path(), "blog/post.md", "# Post");
        write(dir.path(), "blog/2021/old.md", "# Old");

        let (tree, report) = scan_quiet(dir.path());
        assert!(report.is_empty());
        let paths: Vec<_> = tree.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(paths, vec!["", "blog", "blog/2021"]);
        assert_eq!(file_names(&tree, "blog"), vec!["blog/post.md"]);
        let blog = tree.find("blog").unwrap();
        assert_eq!(tree.get(blog).parent, Some(DirId::ROOT));
        assert_eq!(tree.root().subdirs, vec![blog]);
    }

    #[test]
    fn test_scan_skips_hidden_entries() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".git/config", "x");
        write(dir.path(), ".hidden.md", "x");
        write(dir.path(), "page.md", "x");

        let (tree, _) = scan_quiet(dir.path());
        assert_eq!(tree.len(), 1);
        assert_eq!(file_names(&tree, ""), vec!["page.md"]);
    }

    #[test]
    fn test_declaration_metadata_and_inheritance() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".folio", "author: Alice\n");
        write(dir.path(), "blog/.folio", "{\"template\": \"blog.html\"}");
        write(dir.path(), "blog/a/post.md", "x");

        let (tree, _) = scan_quiet(dir.path());
        let a = tree.find("blog/a").unwrap();
        assert_eq!(tree.lookup(a, "template").and_then(Value::as_str), Some("blog.html"));
        assert_eq!(tree.lookup(a, "author").and_then(Value::as_str), Some("Alice"));
        assert_eq!(tree.lookup(a, "site_name").and_then(Value::as_str), Some("Test"));
        assert!(tree.lookup(a, "missing").is_none());
    }

    #[test]
    fn test_ignore_is_replaced_not_merged() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".folio", "ignore: ['*.tmp']\n");
        write(dir.path(), "a.tmp", "x");
        write(dir.path(), "a.bak", "x");
        write(dir.path(), "sub/.folio", "ignore: ['*.bak']\n");
        write(dir.path(), "sub/b.tmp", "x");
        write(dir.path(), "sub/b.bak", "x");
        write(dir.path(), "other/c.tmp", "x");

        let (tree, _) = scan_quiet(dir.path());
        assert_eq!(file_names(&tree, ""), vec!["a.bak"]);
        assert_eq!(file_names(&tree, "sub"), vec!["sub/b.tmp"]);
        assert!(file_names(&tree, "other").is_empty());
    }

    #[test]
    fn test_skip_and_asset_flags() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "private/.folio", "skip: true\n");
        write(dir.path(), "private/secret.md", "x");
        write(dir.path(), "static/.folio", "asset: true\n");
        write(dir.path(), "static/css/site.css", "x");

        let (tree, _) = scan_quiet(dir.path());
        assert!(tree.find("private").is_none());
        let css = tree.find("static/css").unwrap();
        assert!(tree.get(css).asset);
        assert!(tree.lookup(css, "asset").is_none());
    }

    #[test]
    fn test_file_and_dir_rules() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".folio",
            "files:\n  '*.draft.md': { draft: true }\ndirs:\n  '^20\\d\\d$': { template: year.html }\n",
        );
        write(dir.path(), "a.draft.md", "x");
        write(dir.path(), "b.md", "x");
        write(dir.path(), "2021/c.md", "x");
        write(dir.path(), "misc/d.md", "x");

        let (tree, report) = scan_quiet(dir.path());
        assert!(report.is_empty(), "{:?}", report.warnings());
        let root = tree.root();
        assert_eq!(root.file("a.draft.md").unwrap().meta.get_bool("draft"), Some(true));
        assert!(root.file("b.md").unwrap().meta.is_empty());
        let year = tree.find("2021").unwrap();
        assert_eq!(tree.get(year).meta.get_str("template"), Some("year.html"));
        let misc = tree.find("misc").unwrap();
        assert!(tree.get(misc).meta.get("template").is_none());
    }

    #[test]
    fn test_malformed_declaration_is_a_warning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad/.folio", "{ not json");
        write(dir.path(), "bad/page.md", "x");

        let (tree, report) = scan_quiet(dir.path());
        assert!(tree.find("bad").is_some());
        assert!(report.warnings()[0].path.ends_with("bad/.folio"));
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let report = BuildReport::quiet();
        let err = scan(Path::new("/nonexistent/folio/content"), MetaTable::new(), &report)
            .unwrap_err();
        assert!(matches!(err, BuildError::UnreadableRoot { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_a_warning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.md", "x");
        std::os::unix::fs::symlink(dir.path().join("gone.md"), dir.path().join("link.md"))
            .unwrap();

        let (tree, report) = scan_quiet(dir.path());
        assert_eq!(file_names(&tree, ""), vec!["page.md"]);
        assert!(report.mentions("link.md", "broken symlink"));
    }

    #[test]
    fn test_nearest_climbs_to_existing_record() {
        let mut tree = DirTree::single(MetaTable::new());
        let blog = tree.add_dir("blog", MetaTable::new());
        assert_eq!(tree.nearest("blog/tags/python"), blog);
        assert_eq!(tree.nearest("tags/python"), DirId::ROOT);
        assert_eq!(tree.nearest(""), DirId::ROOT);
    }

    #[test]
    fn test_source_file_extension() {
        let mut tree = DirTree::single(MetaTable::new());
        tree.add_file(DirId::ROOT, "blog/post.md");
        tree.add_file(DirId::ROOT, "LICENSE");
        let files = &tree.root().files;
        assert_eq!(files[0].name(), "post.md");
        assert_eq!(files[0].extension(), Some("md"));
        assert_eq!(files[1].extension(), None);
    }
}
