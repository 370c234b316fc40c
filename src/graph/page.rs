//! Page values and their output location.
//!
//! # Path Mapping
//!
//! `build_path` is computed once, in [`Page::new`], from the key and kind:
//!
//! | Key | Kind | build_path |
//! |-----|------|------------|
//! | `index.md` / `blog/README.md` | Markdown | `index.html` / `blog/index.html` |
//! | `blog/hello.md` | Markdown | `blog/hello/index.html` |
//! | `people/alice.yaml` | Data | `people/alice/index.html` |
//! | `img/logo.png` | Asset | `img/logo.png` |
//! | `tags.taxonomy` | Taxonomy | `tags/index.html` |
//! | `tags/python` | Category | `tags/python/index.html` |
//! | `blog/index.rss` | Feed | `blog/index.rss` |
//! | `blog/archive` | Archive | `blog/archive/index.html` |
//! | `blog` | Dir | `blog/index.html` |
//! | `old/url` | Alias | `old/url/index.html` |

use crate::{
    meta::MetaTable,
    scan::{DirId, join_rel},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, collections::BTreeMap, fmt, path::PathBuf};

/// Output file name for pages rendered as directory indices.
pub const INDEX_HTML: &str = "index.html";

// ============================================================================
// PageKey
// ============================================================================

/// Stable identity of a page: its source-relative path.
///
/// Derived pages use a virtual path under the directory they belong to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageKey(String);

impl PageKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory part of the key; empty at the root.
    pub fn dir(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(&self.0, |(_, name)| name)
    }

    /// File name without its last extension.
    pub fn stem(&self) -> &str {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        }
    }
}

impl Borrow<str> for PageKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ============================================================================
// PageKind
// ============================================================================

/// Feed flavours produced by syndication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Rss,
    Atom,
}

/// Closed set of page variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Markdown,
    Data,
    Asset,
    Taxonomy,
    Category { taxonomy: PageKey, name: String },
    Archive,
    Feed(FeedFormat),
    Dir,
    Alias { target: PageKey },
}

impl PageKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Data => "data",
            Self::Asset => "asset",
            Self::Taxonomy => "taxonomy",
            Self::Category { .. } => "category",
            Self::Archive => "archive",
            Self::Feed(FeedFormat::Rss) => "rss",
            Self::Feed(FeedFormat::Atom) => "atom",
            Self::Dir => "dir",
            Self::Alias { .. } => "alias",
        }
    }
}

/// Output location of a page, as a pure function of its key and kind.
pub fn build_path_for(key: &PageKey, kind: &PageKind) -> String {
    match kind {
        PageKind::Asset | PageKind::Feed(_) => key.as_str().to_owned(),
        PageKind::Markdown | PageKind::Data | PageKind::Taxonomy => {
            let is_index = key.stem() == "index"
                || (matches!(kind, PageKind::Markdown) && key.file_name() == "README.md");
            if is_index {
                join_rel(key.dir(), INDEX_HTML)
            } else {
                join_rel(&join_rel(key.dir(), key.stem()), INDEX_HTML)
            }
        }
        PageKind::Category { .. } | PageKind::Archive | PageKind::Dir | PageKind::Alias { .. } => {
            join_rel(key.as_str(), INDEX_HTML)
        }
    }
}

/// Build path without a trailing `index.html`: the path part of the URL.
pub fn site_path(build_path: &str) -> &str {
    if build_path == INDEX_HTML {
        return "";
    }
    build_path
        .strip_suffix(INDEX_HTML)
        .and_then(|dir| dir.strip_suffix('/'))
        .unwrap_or(build_path)
}

// ============================================================================
// Page
// ============================================================================

/// Lifecycle of a page within one build; only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageState {
    Skeleton,
    Loaded,
    Analyzed,
    Rendered,
}

/// Where a source-backed page was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub abs: PathBuf,
    pub mtime: DateTime<Utc>,
}

/// One node of the output tree.
#[derive(Debug, Clone)]
pub struct Page {
    pub key: PageKey,
    pub kind: PageKind,
    /// Directory record metadata is inherited from.
    pub dir: DirId,
    build_path: String,
    pub meta: MetaTable,
    pub body: Option<String>,
    pub source: Option<Source>,
    pub created_from: Option<PageKey>,
    pub related: BTreeMap<String, PageKey>,
    state: PageState,
}

impl Page {
    pub fn new(key: PageKey, kind: PageKind, dir: DirId) -> Self {
        let build_path = build_path_for(&key, &kind);
        Self {
            key,
            kind,
            dir,
            build_path,
            meta: MetaTable::new(),
            body: None,
            source: None,
            created_from: None,
            related: BTreeMap::new(),
            state: PageState::Skeleton,
        }
    }

    /// A page synthesized during analysis from `origin`.
    pub fn derived(key: PageKey, kind: PageKind, dir: DirId, origin: &PageKey) -> Self {
        let mut page = Self::new(key, kind, dir);
        page.created_from = Some(origin.clone());
        page.state = PageState::Loaded;
        page
    }

    pub fn build_path(&self) -> &str {
        &self.build_path
    }

    pub fn site_path(&self) -> &str {
        site_path(&self.build_path)
    }

    /// Absolute URL path under `site_root` (e.g. `/blog/hello/`).
    pub fn url(&self, site_root: &str) -> String {
        let root = site_root.trim_end_matches('/');
        let path = self.site_path();
        match (path.is_empty(), path != self.build_path) {
            (true, _) => format!("{root}/"),
            (false, true) => format!("{root}/{path}/"),
            (false, false) => format!("{root}/{path}"),
        }
    }

    /// Directory relative references are resolved from.
    pub fn source_dir(&self) -> &str {
        match self.kind {
            PageKind::Dir => self.key.as_str(),
            _ => self.key.dir(),
        }
    }

    pub fn is_source_backed(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_indexed(&self) -> bool {
        self.meta.get_bool("indexed").unwrap_or(false)
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.get_str("title")
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.meta.get_date("date")
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    /// Move the page forward in its lifecycle; moving backwards is ignored.
    pub fn advance(&mut self, next: PageState) {
        debug_assert!(next >= self.state, "{}: {:?} -> {next:?}", self.key, self.state);
        self.state = self.state.max(next);
    }

    /// Point `name` at `target`.
    ///
    /// A different target for an existing name is refused with a message for
    /// the build report; the first value stays.
    pub fn set_related(&mut self, name: &str, target: PageKey) -> Result<(), String> {
        match self.related.get(name) {
            Some(existing) if *existing != target => Err(format!(
                "related `{name}` already points to `{existing}`, not changing it to `{target}`"
            )),
            Some(_) => Ok(()),
            None => {
                self.related.insert(name.to_owned(), target);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(key: &str, kind: PageKind) -> String {
        build_path_for(&PageKey::new(key), &kind)
    }

    #[test]
    fn test_build_path_markdown() {
        assert_eq!(path("index.md", PageKind::Markdown), "index.html");
        assert_eq!(path("blog/README.md", PageKind::Markdown), "blog/index.html");
        assert_eq!(path("blog/hello.md", PageKind::Markdown), "blog/hello/index.html");
        assert_eq!(path("about.md", PageKind::Markdown), "about/index.html");
    }

    #[test]
    fn test_build_path_other_kinds() {
        assert_eq!(path("people/alice.yaml", PageKind::Data), "people/alice/index.html");
        assert_eq!(path("people/README.yaml", PageKind::Data), "people/README/index.html");
        assert_eq!(path("img/logo.png", PageKind::Asset), "img/logo.png");
        assert_eq!(path("tags.taxonomy", PageKind::Taxonomy), "tags/index.html");
        assert_eq!(
            path("blog/index.rss", PageKind::Feed(FeedFormat::Rss)),
            "blog/index.rss"
        );
        assert_eq!(path("blog/archive", PageKind::Archive), "blog/archive/index.html");
        assert_eq!(path("", PageKind::Dir), "index.html");
        assert_eq!(path("blog", PageKind::Dir), "blog/index.html");
        let alias = PageKind::Alias {
            target: PageKey::new("a.md"),
        };
        assert_eq!(path("old/url", alias), "old/url/index.html");
    }

    #[test]
    fn test_build_path_is_pure() {
        let a = Page::new(PageKey::new("blog/hello.md"), PageKind::Markdown, DirId::ROOT);
        let b = Page::new(PageKey::new("blog/hello.md"), PageKind::Markdown, DirId::ROOT);
        assert_eq!(a.build_path(), b.build_path());
    }

    #[test]
    fn test_site_path_and_url() {
        let page = Page::new(PageKey::new("blog/hello.md"), PageKind::Markdown, DirId::ROOT);
        assert_eq!(page.site_path(), "blog/hello");
        assert_eq!(page.url("/"), "/blog/hello/");
        assert_eq!(page.url("/docs/"), "/docs/blog/hello/");

        let root = Page::new(PageKey::new("index.md"), PageKind::Markdown, DirId::ROOT);
        assert_eq!(root.site_path(), "");
        assert_eq!(root.url("/"), "/");

        let asset = Page::new(PageKey::new("img/a.png"), PageKind::Asset, DirId::ROOT);
        assert_eq!(asset.url("/"), "/img/a.png");

        let odd = Page::new(PageKey::new("files/myindex.html"), PageKind::Asset, DirId::ROOT);
        assert_eq!(odd.site_path(), "files/myindex.html");
        assert_eq!(odd.url("/"), "/files/myindex.html");
    }

    #[test]
    fn test_page_key_parts() {
        let key = PageKey::new("blog/2021/post.md");
        assert_eq!(key.dir(), "blog/2021");
        assert_eq!(key.file_name(), "post.md");
        assert_eq!(key.stem(), "post");
        assert_eq!(PageKey::new("README").stem(), "README");
        assert_eq!(PageKey::new(".folio").stem(), ".folio");
    }

    #[test]
    fn test_state_only_moves_forward() {
        let mut page = Page::new(PageKey::new("a.md"), PageKind::Markdown, DirId::ROOT);
        assert_eq!(page.state(), PageState::Skeleton);
        page.advance(PageState::Loaded);
        page.advance(PageState::Analyzed);
        assert_eq!(page.state(), PageState::Analyzed);
    }

    #[test]
    fn test_set_related_keeps_first_value() {
        let mut page = Page::new(PageKey::new("a.md"), PageKind::Markdown, DirId::ROOT);
        assert!(page.set_related("rss_feed", PageKey::new("index.rss")).is_ok());
        assert!(page.set_related("rss_feed", PageKey::new("index.rss")).is_ok());
        let err = page
            .set_related("rss_feed", PageKey::new("blog/index.rss"))
            .unwrap_err();
        assert!(err.contains("rss_feed"));
        assert_eq!(page.related["rss_feed"], PageKey::new("index.rss"));
    }
}
