//! Rendering the analyzed graph to the output directory.
//!
//! # Architecture
//!
//! ```text
//! Site::render(renderer, output)
//!     │
//!     ├── RenderContext::new(graph, page)   per page, read-only graph
//!     ├── Renderer::render(page, ctx)       rayon, one page per task
//!     │       └── Output::Bytes | Output::Copy
//!     └── write output/<build_path>         parents created on demand
//! ```
//!
//! A page that fails to render is a warning; the others are still written.
//! Nothing here changes the structure of the graph, only page states.

mod basic;

pub use basic::BasicRenderer;

use crate::{
    graph::{Page, PageGraph, PageKey, PageState},
    log,
    logger::Progress,
    meta::Value,
    site::Site,
};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Renderer
// ============================================================================

/// Rendered form of one page.
#[derive(Debug, PartialEq)]
pub enum Output {
    Bytes(Vec<u8>),
    /// Copy this file verbatim.
    Copy(PathBuf),
}

pub trait Renderer: Sync {
    fn render(&self, page: &Page, cx: &RenderContext) -> Result<Output>;
}

// ============================================================================
// RenderContext
// ============================================================================

/// A page reference as renderers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    pub key: String,
    /// URL path under the site root, e.g. `/blog/hello/`.
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Everything a renderer may look at for one page.
///
/// `meta` holds the page's own keys plus every inherited key visible from its
/// directory, with page references expanded to [`PageRef`] objects.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub key: String,
    pub kind: &'static str,
    pub url: String,
    /// Absolute base URL from `site_url`; empty when unset.
    pub site_url: String,
    pub meta: Map<String, Json>,
    pub related: Map<String, Json>,
    pub body: Option<String>,
}

impl RenderContext {
    pub fn new(graph: &PageGraph, page: &Page) -> Self {
        let key = page.key.as_str();
        let site_root = graph.lookup_str(key, "site_root").unwrap_or("/");
        let site_url = graph
            .lookup_str(key, "site_url")
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_owned();

        let mut meta = Map::new();
        for (name, value) in page.meta.iter() {
            meta.insert(name.clone(), expand(graph, value, site_root));
        }
        for record in graph.dirs().ancestors(page.dir) {
            for (name, value) in record.meta.iter() {
                if !meta.contains_key(name) && graph.fields().is_inherited(name) {
                    meta.insert(name.clone(), expand(graph, value, site_root));
                }
            }
        }
        meta.insert("title".into(), Json::String(graph.title_of(key)));

        let related = page
            .related
            .iter()
            .filter_map(|(name, target)| {
                let target = page_ref(graph, target, site_root)?;
                Some((name.clone(), serde_json::to_value(target).ok()?))
            })
            .collect();

        Self {
            key: key.to_owned(),
            kind: page.kind.label(),
            url: page.url(site_root),
            site_url,
            meta,
            related,
            body: page.body.clone(),
        }
    }

    pub fn title(&self) -> &str {
        self.meta
            .get("title")
            .and_then(Json::as_str)
            .unwrap_or_default()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.meta.get(name).and_then(Json::as_str)
    }

    /// Page references stored under `name`, skipping anything else.
    pub fn page_refs(&self, name: &str) -> Vec<PageRef> {
        let items = match self.meta.get(name) {
            Some(Json::Array(items)) => items.as_slice(),
            Some(single @ Json::Object(_)) => std::slice::from_ref(single),
            _ => &[],
        };
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect()
    }

    pub fn related(&self, name: &str) -> Option<PageRef> {
        self.related
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// `url` prefixed with the site URL, when one is configured.
    pub fn absolute(&self, url: &str) -> String {
        format!("{}{url}", self.site_url)
    }

    pub fn to_json(&self) -> Json {
        serde_json::json!({
            "key": self.key,
            "kind": self.kind,
            "url": self.url,
            "site_url": self.site_url,
            "meta": self.meta,
            "related": self.related,
            "body": self.body,
        })
    }
}

fn expand(graph: &PageGraph, value: &Value, site_root: &str) -> Json {
    match value {
        Value::Page(key) => page_ref(graph, key, site_root)
            .and_then(|r| serde_json::to_value(r).ok())
            .unwrap_or(Json::Null),
        Value::List(items) => Json::Array(items.iter().map(|v| expand(graph, v, site_root)).collect()),
        Value::Table(table) => Json::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), expand(graph, v, site_root)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

fn page_ref(graph: &PageGraph, key: &PageKey, site_root: &str) -> Option<PageRef> {
    let page = graph.get(key.as_str())?;
    Some(PageRef {
        key: key.to_string(),
        url: page.url(site_root),
        title: graph.title_of(key.as_str()),
        date: page.date().map(|d| d.to_rfc3339()),
    })
}

// ============================================================================
// Driver
// ============================================================================

/// Outcome of one render run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub written: usize,
    pub failed: usize,
}

impl Site {
    /// Render every page into `output`, in parallel.
    pub fn render(&mut self, renderer: &dyn Renderer, output: &Path) -> RenderSummary {
        let graph = &self.graph;
        let report = &self.report;
        let pages: Vec<&Page> = graph.pages().collect();
        let progress = Progress::new("render", pages.len());

        let rendered: Vec<PageKey> = pages
            .par_iter()
            .filter_map(|page| {
                let result = render_one(graph, page, renderer, output);
                progress.inc();
                match result {
                    Ok(()) => Some(page.key.clone()),
                    Err(err) => {
                        report.warn(page.key.as_str(), format!("{err:#}"));
                        None
                    }
                }
            })
            .collect();
        progress.finish();

        let summary = RenderSummary {
            written: rendered.len(),
            failed: pages.len() - rendered.len(),
        };
        for key in rendered {
            if let Some(page) = self.graph.get_mut(key.as_str()) {
                page.advance(PageState::Rendered);
            }
        }
        log!("render"; "{} files written, {} failed", summary.written, summary.failed);
        summary
    }
}

fn render_one(graph: &PageGraph, page: &Page, renderer: &dyn Renderer, output: &Path) -> Result<()> {
    let cx = RenderContext::new(graph, page);
    let rendered = renderer.render(page, &cx)?;
    let dest = output.join(page.build_path());
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    match rendered {
        Output::Bytes(bytes) => {
            fs::write(&dest, bytes).with_context(|| format!("cannot write {}", dest.display()))?;
        }
        Output::Copy(src) => {
            fs::copy(&src, &dest)
                .with_context(|| format!("cannot copy {} to {}", src.display(), dest.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::testing::{add, graph},
        meta::MetaTable,
        site::BuildReport,
    };
    use anyhow::bail;
    use tempfile::TempDir;

    struct Failing;

    impl Renderer for Failing {
        fn render(&self, page: &Page, cx: &RenderContext) -> Result<Output> {
            if page.key.as_str() == "bad.md" {
                bail!("template exploded");
            }
            Ok(Output::Bytes(cx.title().as_bytes().to_vec()))
        }
    }

    #[test]
    fn test_context_resolves_inherited_and_references() {
        let mut g = graph();
        add(&mut g, "blog/a.md", Some("2021-01-01"));
        add(&mut g, "blog/index.md", None);
        let index = g.get_mut("blog/index.md").unwrap();
        index.meta.set("title", "Blog");
        index.meta.set("pages", Value::List(vec![Value::Page(PageKey::new("blog/a.md"))]));
        index.related.insert("rss_feed".into(), PageKey::new("blog/a.md"));

        let page = g.get("blog/index.md").unwrap();
        let cx = RenderContext::new(&g, page);
        assert_eq!(cx.get_str("site_name"), Some("Test site"));
        assert_eq!(cx.url, "/blog/");
        let refs = cx.page_refs("pages");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].url, "/blog/a/");
        assert_eq!(refs[0].title, "a");
        assert!(refs[0].date.as_deref().unwrap().starts_with("2021-01-01"));
        assert_eq!(cx.related("rss_feed").unwrap().key, "blog/a.md");
        assert_eq!(cx.to_json()["meta"]["title"], "Blog");
    }

    #[test]
    fn test_page_local_keys_do_not_climb() {
        let mut root = MetaTable::new();
        root.set("title", "Root title");
        root.set("author", "Alice");
        let mut g = PageGraph::new(
            crate::scan::DirTree::single(root),
            crate::features::default_registry(&[]).fields(),
        );
        add(&mut g, "post.md", None);
        let cx = RenderContext::new(&g, g.get("post.md").unwrap());
        assert_eq!(cx.get_str("author"), Some("Alice"));
        assert_eq!(cx.title(), "post");
    }

    #[test]
    fn test_render_failures_are_warnings() {
        let mut g = graph();
        add(&mut g, "good.md", None);
        add(&mut g, "bad.md", None);
        g.advance_all(PageState::Analyzed);
        let mut site = Site {
            graph: g,
            report: BuildReport::quiet(),
        };

        let out = TempDir::new().unwrap();
        let summary = site.render(&Failing, out.path());
        assert_eq!(summary, RenderSummary { written: 1, failed: 1 });
        assert_eq!(fs::read_to_string(out.path().join("good/index.html")).unwrap(), "good");
        assert!(site.report.mentions("bad.md", "template exploded"));
        assert_eq!(site.graph.get("good.md").unwrap().state(), PageState::Rendered);
        assert_eq!(site.graph.get("bad.md").unwrap().state(), PageState::Analyzed);
    }
}
