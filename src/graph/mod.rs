//! The page graph.
//!
//! # Architecture
//!
//! ```text
//! PageGraph
//!   ├── pages: BTreeMap<PageKey, Page>     owns every page of the build
//!   ├── build_paths: build_path → PageKey  collision detection, lookups
//!   ├── dirs: DirTree                      directory metadata records
//!   └── fields: Fields                     which keys inherit
//! ```
//!
//! Pages never own each other. `created_from`, `related`, and `Value::Page`
//! hold keys that are looked up here on demand.

mod page;
pub mod resolve;

pub use page::{
    FeedFormat, INDEX_HTML, Page, PageKey, PageKind, PageState, Source, build_path_for, site_path,
};
pub use resolve::ResolveError;

use crate::{
    meta::{Fields, Value},
    scan::{DirId, DirTree, join_rel},
    site::BuildError,
};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct PageGraph {
    pages: BTreeMap<PageKey, Page>,
    build_paths: FxHashMap<String, PageKey>,
    dirs: DirTree,
    fields: Fields,
}

impl PageGraph {
    pub fn new(dirs: DirTree, fields: Fields) -> Self {
        Self {
            pages: BTreeMap::new(),
            build_paths: FxHashMap::default(),
            dirs,
            fields,
        }
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Add a page, refusing to replace anything already at its key or output.
    pub fn insert(&mut self, page: Page) -> Result<(), BuildError> {
        let existing = self
            .build_paths
            .get(page.build_path())
            .or_else(|| self.pages.get(&page.key).map(|p| &p.key));
        if let Some(existing) = existing {
            return Err(BuildError::Collision {
                build_path: page.build_path().to_owned(),
                existing: existing.to_string(),
                incoming: page.key.to_string(),
            });
        }
        self.build_paths
            .insert(page.build_path().to_owned(), page.key.clone());
        self.pages.insert(page.key.clone(), page);
        Ok(())
    }

    /// Drop every page for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&Page) -> bool) -> Vec<PageKey> {
        let removed: Vec<PageKey> = self
            .pages
            .values()
            .filter(|p| !keep(p))
            .map(|p| p.key.clone())
            .collect();
        for key in &removed {
            if let Some(page) = self.pages.remove(key) {
                self.build_paths.remove(page.build_path());
            }
        }
        removed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get(&self, key: &str) -> Option<&Page> {
        self.pages.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Page> {
        self.pages.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pages.contains_key(key)
    }

    pub fn contains_build_path(&self, build_path: &str) -> bool {
        self.build_paths.contains_key(build_path)
    }

    pub fn by_build_path(&self, build_path: &str) -> Option<&Page> {
        self.build_paths
            .get(build_path)
            .and_then(|key| self.pages.get(key))
    }

    /// Page rendered as `dir/index.html`, if any.
    pub fn index_of(&self, dir: &str) -> Option<&Page> {
        self.by_build_path(&join_rel(dir, INDEX_HTML))
    }

    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    /// Pages whose key sits directly in `dir`.
    pub fn pages_in_dir<'a>(&'a self, dir: &'a str) -> impl Iterator<Item = &'a Page> + 'a {
        self.pages.values().filter(move |p| p.key.dir() == dir)
    }

    pub fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages.values_mut()
    }

    /// Snapshot of keys, for passes that mutate while iterating.
    pub fn keys(&self) -> Vec<PageKey> {
        self.pages.keys().cloned().collect()
    }

    /// Keys of pages whose own metadata has `name`.
    pub fn keys_with(&self, name: &str) -> Vec<PageKey> {
        self.pages
            .values()
            .filter(|p| p.meta.contains(name))
            .map(|p| p.key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn dirs(&self) -> &DirTree {
        &self.dirs
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Inheritance-aware lookup of `name` for the page `key`.
    ///
    /// The page's own table wins; otherwise, for inheritable keys, the nearest
    /// directory record defining it, up to the root.
    pub fn lookup(&self, key: &str, name: &str) -> Option<&Value> {
        let page = self.pages.get(key)?;
        if let Some(value) = page.meta.get(name) {
            return Some(value);
        }
        if !self.fields.is_inherited(name) {
            return None;
        }
        self.dirs.lookup(page.dir, name)
    }

    pub fn lookup_str(&self, key: &str, name: &str) -> Option<&str> {
        self.lookup(key, name).and_then(Value::as_str)
    }

    /// Newest `date` among `keys`.
    pub fn newest_date<'a>(&self, keys: impl IntoIterator<Item = &'a PageKey>) -> Option<DateTime<Utc>> {
        keys.into_iter()
            .filter_map(|k| self.pages.get(k).and_then(Page::date))
            .max()
    }

    /// Display title: own `title`, else the `site_name` for the root, else the
    /// last path component.
    pub fn title_of(&self, key: &str) -> String {
        let Some(page) = self.pages.get(key) else {
            return key.to_owned();
        };
        if let Some(title) = page.title() {
            return title.to_owned();
        }
        let path = page.site_path();
        if path.is_empty() {
            return self.lookup_str(key, "site_name").unwrap_or_default().to_owned();
        }
        path.rsplit('/').next().unwrap_or(path).to_owned()
    }

    /// Record for a derived page living at `path`.
    pub fn dir_for(&self, path: &str) -> DirId {
        self.dirs.nearest(path)
    }

    /// Advance every page to `state`.
    pub fn advance_all(&mut self, state: PageState) {
        for page in self.pages.values_mut() {
            page.advance(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{Field, MetaTable};

    fn md(key: &str) -> Page {
        Page::new(PageKey::new(key), PageKind::Markdown, DirId::ROOT)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut graph = PageGraph::default();
        graph.insert(md("blog/a.md")).unwrap();
        assert!(graph.contains("blog/a.md"));
        assert!(graph.contains_build_path("blog/a/index.html"));
        assert_eq!(
            graph.by_build_path("blog/a/index.html").unwrap().key,
            PageKey::new("blog/a.md")
        );
    }

    #[test]
    fn test_insert_refuses_build_path_collision() {
        let mut graph = PageGraph::default();
        graph.insert(md("tags/index.md")).unwrap();
        let taxonomy = Page::new(PageKey::new("tags.taxonomy"), PageKind::Taxonomy, DirId::ROOT);

        let err = graph.insert(taxonomy).unwrap_err();
        let BuildError::Collision {
            build_path,
            existing,
            incoming,
        } = err
        else {
            panic!("expected collision");
        };
        assert_eq!(build_path, "tags/index.html");
        assert_eq!(existing, "tags/index.md");
        assert_eq!(incoming, "tags.taxonomy");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_insert_refuses_derived_over_source() {
        let mut graph = PageGraph::default();
        graph.insert(md("tags/python.md")).unwrap();
        let category = Page::derived(
            PageKey::new("tags/python"),
            PageKind::Category {
                taxonomy: PageKey::new("tags.taxonomy"),
                name: "python".into(),
            },
            DirId::ROOT,
            &PageKey::new("tags.taxonomy"),
        );
        assert!(matches!(
            graph.insert(category),
            Err(BuildError::Collision { .. })
        ));
    }

    #[test]
    fn test_lookup_climbs_directory_records() {
        let mut root = MetaTable::new();
        root.set("author", "Root");
        root.set("license", "CC-BY");
        root.set("title", "Root title");
        let mut dirs = DirTree::single(root);
        let mut blog = MetaTable::new();
        blog.set("author", "Blog");
        let blog_id = dirs.add_dir("blog", blog);
        let post_id = dirs.add_dir("blog/2021", MetaTable::new());

        let mut graph = PageGraph::new(dirs, Fields::with_core());
        let mut own = Page::new(PageKey::new("blog/2021/own.md"), PageKind::Markdown, post_id);
        own.meta.set("author", "Own");
        graph.insert(own).unwrap();
        graph
            .insert(Page::new(PageKey::new("blog/2021/plain.md"), PageKind::Markdown, post_id))
            .unwrap();
        graph
            .insert(Page::new(PageKey::new("blog/b.md"), PageKind::Markdown, blog_id))
            .unwrap();

        // own value, then nearest record, then root
        assert_eq!(graph.lookup_str("blog/2021/own.md", "author"), Some("Own"));
        assert_eq!(graph.lookup_str("blog/2021/plain.md", "author"), Some("Blog"));
        assert_eq!(graph.lookup_str("blog/2021/plain.md", "license"), Some("CC-BY"));
        // page-local keys never climb
        assert_eq!(graph.lookup_str("blog/b.md", "title"), None);
        assert_eq!(graph.lookup_str("blog/b.md", "missing"), None);
    }

    #[test]
    fn test_lookup_respects_registered_fields() {
        let mut root = MetaTable::new();
        root.set("series", "tutorial");
        let mut fields = Fields::with_core();
        fields.register(Field::local("series", "series name"));
        let mut graph = PageGraph::new(DirTree::single(root), fields);
        graph.insert(md("a.md")).unwrap();
        assert!(graph.lookup("a.md", "series").is_none());
    }

    #[test]
    fn test_retain_frees_build_paths() {
        let mut graph = PageGraph::default();
        graph.insert(md("a.md")).unwrap();
        graph.insert(md("b.md")).unwrap();
        let removed = graph.retain(|p| p.key.as_str() != "a.md");
        assert_eq!(removed, vec![PageKey::new("a.md")]);
        assert!(!graph.contains_build_path("a/index.html"));
        graph.insert(md("a.md")).unwrap();
    }

    #[test]
    fn test_title_of_falls_back() {
        let mut root = MetaTable::new();
        root.set("site_name", "Notes");
        let mut graph = PageGraph::new(DirTree::single(root), Fields::with_core());
        graph.insert(Page::new(PageKey::new(""), PageKind::Dir, DirId::ROOT)).unwrap();
        graph.insert(md("blog/hello.md")).unwrap();
        let mut titled = md("x.md");
        titled.meta.set("title", "X marks");
        graph.insert(titled).unwrap();

        assert_eq!(graph.title_of(""), "Notes");
        assert_eq!(graph.title_of("blog/hello.md"), "hello");
        assert_eq!(graph.title_of("x.md"), "X marks");
    }
}
