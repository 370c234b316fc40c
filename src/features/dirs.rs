//! Automatic directory index pages.
//!
//! Every directory that has something to list but no `index.html` of its own
//! gets a generated one. Directories are processed deepest first, so a parent
//! can list the generated indices of its subdirectories.

use super::{by_date_then_key, page_list};
use crate::{
    feature::{Analysis, Feature},
    graph::{Page, PageKey, PageKind, PageState},
    log,
    meta::Field,
};
use anyhow::Result;

pub struct DirIndex;

impl Feature for DirIndex {
    fn name(&self) -> &'static str {
        "dirs"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["taxonomy"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::local("subdirs", "Index pages of subdirectories")]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut by_depth: Vec<_> = graph
            .dirs()
            .iter()
            .map(|d| (d.path.matches('/').count() + usize::from(!d.path.is_empty()), d.id))
            .collect();
        by_depth.sort_by(|a, b| b.cmp(a));

        let mut created = 0;
        for (_, id) in by_depth {
            let record = graph.dirs().get(id);
            let path = record.path.clone();
            if graph.index_of(&path).is_some() {
                continue;
            }

            let mut pages: Vec<PageKey> = graph
                .pages_in_dir(&path)
                .filter(|p| p.is_indexed() && p.kind != PageKind::Dir)
                .map(|p| p.key.clone())
                .collect();
            pages.sort_by(|a, b| by_date_then_key(graph, a, b));
            let subdirs: Vec<PageKey> = record
                .subdirs
                .iter()
                .filter_map(|sub| graph.index_of(&graph.dirs().get(*sub).path))
                .map(|p| p.key.clone())
                .collect();
            if pages.is_empty() && subdirs.is_empty() {
                continue;
            }

            let title = if path.is_empty() {
                graph
                    .dirs()
                    .lookup(id, "site_name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_owned()
            } else {
                record.name().to_owned()
            };
            let date = graph.newest_date(pages.iter().chain(&subdirs));

            let mut page = Page::new(PageKey::new(path), PageKind::Dir, id);
            page.meta.set("title", title);
            page.meta.set("pages", page_list(&pages));
            page.meta.set("subdirs", page_list(&subdirs));
            page.meta.set("indexed", false);
            if let Some(date) = date {
                page.meta.set("date", date);
            }
            page.advance(PageState::Loaded);
            graph.insert(page)?;
            created += 1;
        }

        if created > 0 {
            log!("dirs"; "{created} directory indices");
        }
        Ok(())
    }
}
