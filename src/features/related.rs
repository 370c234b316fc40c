//! Named links to other pages.
//!
//! ```yaml
//! related:
//!   sequel: ../part-two
//!   source: /code/index
//! ```
//!
//! Each entry is resolved from the page and stored in the page's `related`
//! links, next to the `rss_feed`/`atom_feed`/`archive` links syndication
//! adds. The front matter table itself is consumed.

use crate::{
    feature::{Analysis, Feature},
    graph::PageKey,
    log,
    meta::Field,
};
use anyhow::Result;

pub struct Related;

impl Feature for Related {
    fn name(&self) -> &'static str {
        "related"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["syndication"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::local("related", "Named paths of related pages")]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut linked = 0;
        for key in graph.keys_with("related") {
            let Some(page) = graph.get(key.as_str()) else {
                continue;
            };
            let Some(table) = page.meta.get_table("related") else {
                cx.report
                    .warn(key.as_str(), "`related` must map names to page paths");
                continue;
            };

            let mut links: Vec<(String, PageKey)> = Vec::with_capacity(table.len());
            for (name, target) in table.iter() {
                match graph.resolve_value(key.as_str(), target) {
                    Ok(target) => links.push((name.clone(), target)),
                    Err(err) => cx
                        .report
                        .warn(key.as_str(), format!("related `{name}` skipped: {err}")),
                }
            }

            let Some(page) = graph.get_mut(key.as_str()) else {
                continue;
            };
            page.meta.remove("related");
            for (name, target) in links {
                match page.set_related(&name, target) {
                    Ok(()) => linked += 1,
                    Err(message) => cx.report.warn(key.as_str(), message),
                }
            }
        }

        if linked > 0 {
            log!("related"; "{linked} links");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::testing::{add, graph, run},
        meta::{MetaTable, Value},
    };

    fn related(entries: &[(&str, &str)]) -> Value {
        let mut table = MetaTable::new();
        for (name, path) in entries {
            table.set(*name, *path);
        }
        Value::Table(table)
    }

    #[test]
    fn test_related_paths_are_resolved() {
        let mut g = graph();
        add(&mut g, "blog/one.md", None);
        add(&mut g, "blog/two.md", None);
        add(&mut g, "about.md", None);
        g.get_mut("blog/one.md").unwrap().meta.set(
            "related",
            related(&[("sequel", "two"), ("author", "/about")]),
        );

        let report = run(&Related, &mut g);
        assert!(report.is_empty(), "{:?}", report.warnings());
        let one = g.get("blog/one.md").unwrap();
        assert_eq!(one.related["sequel"].as_str(), "blog/two.md");
        assert_eq!(one.related["author"].as_str(), "about.md");
        assert!(!one.meta.contains("related"));
    }

    #[test]
    fn test_unresolved_and_conflicting_links_warn() {
        let mut g = graph();
        add(&mut g, "a.md", None);
        add(&mut g, "b.md", None);
        add(&mut g, "feed.md", None);
        let page = g.get_mut("a.md").unwrap();
        page.related.insert("rss_feed".into(), PageKey::new("feed.md"));
        page.meta.set(
            "related",
            related(&[("rss_feed", "b"), ("gone", "missing"), ("next", "b")]),
        );

        let report = run(&Related, &mut g);
        assert!(report.mentions("a.md", "related `gone` skipped"));
        assert!(report.mentions("a.md", "already points to `feed.md`"));
        let a = g.get("a.md").unwrap();
        assert_eq!(a.related["rss_feed"].as_str(), "feed.md");
        assert_eq!(a.related["next"].as_str(), "b.md");
        assert!(!a.related.contains_key("gone"));
    }

    #[test]
    fn test_non_table_is_a_warning() {
        let mut g = graph();
        add(&mut g, "a.md", None);
        g.get_mut("a.md").unwrap().meta.set("related", "b");
        let report = run(&Related, &mut g);
        assert!(report.mentions("a.md", "must map names"));
    }
}
