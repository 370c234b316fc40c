//! Navigation links.
//!
//! `nav` is inherited: a list set in a directory's `.folio` applies to every
//! page below it. Each entry is a path resolved from the page (see
//! [`crate::graph::resolve`]) and replaced by a page reference; entries that
//! don't resolve are reported and dropped. Link targets get a `nav_title`,
//! defaulting to their title.

use super::page_list;
use crate::{
    feature::{Analysis, Feature},
    graph::{PageKey, PageKind},
    log,
    meta::{Field, Value},
};
use anyhow::Result;
use std::collections::BTreeSet;

pub struct Nav;

impl Feature for Nav {
    fn name(&self) -> &'static str {
        "nav"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["dirs", "syndication"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::inherited("nav", "Paths of the pages linked from the navigation bar"),
            Field::local("nav_title", "Title used when the page is linked in a navigation bar"),
        ]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut resolved: Vec<(PageKey, Vec<PageKey>)> = Vec::new();
        for page in graph.pages() {
            if matches!(
                page.kind,
                PageKind::Asset | PageKind::Feed(_) | PageKind::Alias { .. }
            ) {
                continue;
            }
            let Some(nav) = graph.lookup(page.key.as_str(), "nav") else {
                continue;
            };
            let entries = match nav {
                Value::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };

            let mut links = Vec::with_capacity(entries.len());
            for entry in entries {
                match graph.resolve_value(page.key.as_str(), entry) {
                    Ok(target) => links.push(target),
                    Err(err) => cx
                        .report
                        .warn(page.key.as_str(), format!("nav entry skipped: {err}")),
                }
            }
            resolved.push((page.key.clone(), links));
        }

        let mut targets = BTreeSet::new();
        for (key, links) in &resolved {
            targets.extend(links.iter().cloned());
            if let Some(page) = graph.get_mut(key.as_str()) {
                page.meta.set("nav", page_list(links));
            }
        }
        for target in &targets {
            let title = graph.title_of(target.as_str());
            if let Some(page) = graph.get_mut(target.as_str()) {
                page.meta.set_default("nav_title", title);
            }
        }

        if !resolved.is_empty() {
            log!("nav"; "{} pages, {} link targets", resolved.len(), targets.len());
        }
        Ok(())
    }
}
