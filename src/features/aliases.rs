//! Redirect pages for moved content.
//!
//! ```yaml
//! aliases: [old-name, 2019/old-name]
//! ```
//!
//! Each alias is a site path relative to the content root; it becomes an
//! `Alias` page at `<alias>/index.html` redirecting to the page. Aliases run
//! last so that they never take an output path another feature wanted.

use crate::{
    feature::{Analysis, Feature},
    graph::{INDEX_HTML, Page, PageKey, PageKind, resolve::normalize},
    log,
    meta::{Field, Value},
    scan::join_rel,
};
use anyhow::Result;

pub struct Aliases;

impl Feature for Aliases {
    fn name(&self) -> &'static str {
        "aliases"
    }

    fn runs_after(&self) -> &[&'static str] {
        &[
            "markdown",
            "data",
            "taxonomy",
            "dirs",
            "pages",
            "series",
            "syndication",
            "nav",
            "related",
            "images",
        ]
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::local("aliases", "Other site paths redirecting to this page")]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut created = 0;
        for key in graph.keys_with("aliases") {
            let Some(page) = graph.get(key.as_str()) else {
                continue;
            };
            let Some(aliases) = page.meta.get("aliases").map(Value::string_items) else {
                continue;
            };
            let aliases: Vec<String> = aliases.into_iter().map(str::to_owned).collect();
            let title = graph.title_of(key.as_str());

            for alias in aliases {
                let Some(path) = normalize("", &alias).filter(|p| !p.is_empty()) else {
                    cx.report
                        .warn(key.as_str(), format!("alias `{alias}` points outside the site"));
                    continue;
                };
                let build_path = join_rel(&path, INDEX_HTML);
                if let Some(existing) = graph.get(&path).or_else(|| graph.by_build_path(&build_path)) {
                    let message = if existing.key == key {
                        format!("alias `{alias}` points to the page itself")
                    } else {
                        format!("alias `{alias}` is already taken by `{}`", existing.key)
                    };
                    cx.report.warn(key.as_str(), message);
                    continue;
                }

                let kind = PageKind::Alias { target: key.clone() };
                let mut redirect = Page::derived(PageKey::new(path.as_str()), kind, graph.dir_for(&path), &key);
                redirect.meta.set("title", title.as_str());
                redirect.meta.set("page", key.clone());
                redirect.meta.set("indexed", false);
                graph.insert(redirect)?;
                created += 1;
            }
        }

        if created > 0 {
            log!("aliases"; "{created} redirects");
        }
        Ok(())
    }
}
