//! `pages` filter expansion.
//!
//! A `pages` string or table is replaced by the list of pages it selects (see
//! [`crate::filter`]). A page that already holds a list is left alone. The
//! page's `date` is raised to the newest selected page's date.

use super::page_list;
use crate::{
    feature::{Analysis, Feature},
    filter::PageFilter,
    log,
    meta::{Field, Value},
};
use anyhow::Result;

pub struct Pages;

impl Feature for Pages {
    fn name(&self) -> &'static str {
        "pages"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["taxonomy", "dirs"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::local("pages", "Page filter, expanded to the selected pages")]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;
        let mut expanded = 0;
        for key in graph.keys_with("pages") {
            let Some(page) = graph.get(key.as_str()) else {
                continue;
            };
            let Some(query) = page.meta.get("pages") else {
                continue;
            };
            if matches!(query, Value::List(_)) {
                continue;
            }

            let selected = match PageFilter::from_value(query, graph) {
                Ok(filter) => filter.select(graph, &key),
                Err(err) => {
                    cx.report.warn(key.as_str(), format!("pages: {err}"));
                    Vec::new()
                }
            };
            let newest = graph.newest_date(&selected);

            let Some(page) = graph.get_mut(key.as_str()) else {
                continue;
            };
            page.meta.set("pages", page_list(&selected));
            if let Some(newest) = newest
                && page.date().is_none_or(|own| own < newest)
            {
                page.meta.set("date", newest);
            }
            expanded += 1;
        }

        if expanded > 0 {
            log!("pages"; "{expanded} page lists expanded");
        }
        Ok(())
    }
}
