//! Series sequencing.
//!
//! A page is part of one sequence for each category of each taxonomy it
//! belongs to, plus one series named by its `series` value. Each sequence is
//! ordered by date, with the key breaking ties, and described by a table:
//!
//! | Key | Value |
//! |-----|-------|
//! | `name` | series or category name |
//! | `index` | 1-based position |
//! | `length` | number of pages in the sequence |
//! | `first`, `last` | page references |
//! | `prev`, `next` | page references, null at the ends |
//! | `title` | series title in effect for this page |
//!
//! The page's own series lands in `series_info`. Category sequences land in
//! `sequences.<taxonomy>.<category>`:
//!
//! ```yaml
//! series: [trip]          # or `series: trip`; the first name wins
//! tags: [rust, travel]    # sequences.tags.rust, sequences.tags.travel
//! ```
//!
//! `series_title` set on a page applies from that page onward; before any
//! page sets one, the first page's title is used.

use super::{by_date_then_key, page_keys};
use crate::{
    feature::{Analysis, Feature},
    graph::{PageGraph, PageKey, PageKind},
    log,
    meta::{Field, MetaTable, Value},
};
use anyhow::Result;
use std::collections::BTreeMap;

pub struct Series;

impl Feature for Series {
    fn name(&self) -> &'static str {
        "series"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["taxonomy"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::local("series", "Name of the series the page belongs to"),
            Field::local("series_title", "Series title from this page onward"),
            Field::local("series_info", "Position of the page in its series"),
            Field::local("sequences", "Position of the page in each of its categories"),
        ]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let graph = &mut *cx.graph;

        // ====================================================================
        // Named series
        // ====================================================================
        let mut series: BTreeMap<String, Vec<PageKey>> = BTreeMap::new();
        for page in graph.pages() {
            let name = page
                .meta
                .get("series")
                .and_then(|value| value.string_items().first().map(|s| s.to_string()));
            if let Some(name) = name {
                series.entry(name).or_default().push(page.key.clone());
            }
        }
        let count = series.len();
        for (name, mut keys) in series {
            keys.sort_by(|a, b| by_date_then_key(graph, a, b));
            for (key, info) in sequence(graph, &name, &keys) {
                if let Some(page) = graph.get_mut(key.as_str()) {
                    page.meta.set("series_info", info);
                }
            }
        }

        // ====================================================================
        // Category sequences
        // ====================================================================
        let categories: Vec<(String, String, Vec<PageKey>)> = graph
            .pages()
            .filter_map(|page| {
                let PageKind::Category { taxonomy, name } = &page.kind else {
                    return None;
                };
                let members = page_keys(page.meta.get("pages")?);
                Some((taxonomy.stem().to_owned(), name.clone(), members))
            })
            .collect();
        for (taxonomy, category, members) in &categories {
            for (key, info) in sequence(graph, category, members) {
                let Some(page) = graph.get_mut(key.as_str()) else {
                    continue;
                };
                let mut sequences = page.meta.get_table("sequences").cloned().unwrap_or_default();
                let mut by_category = sequences.get_table(taxonomy).cloned().unwrap_or_default();
                by_category.set(category.as_str(), info);
                sequences.set(taxonomy.as_str(), by_category);
                page.meta.set("sequences", sequences);
            }
        }

        if count > 0 || !categories.is_empty() {
            log!("series"; "{count} series, {} category sequences", categories.len());
        }
        Ok(())
    }
}

/// Sequence tables for `keys`, already in order.
fn sequence(graph: &PageGraph, name: &str, keys: &[PageKey]) -> Vec<(PageKey, MetaTable)> {
    let reference = |i: Option<usize>| {
        i.and_then(|i| keys.get(i))
            .map_or(Value::Null, |k| Value::Page(k.clone()))
    };

    let mut title: Option<String> = None;
    let mut infos = Vec::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        let Some(page) = graph.get(key.as_str()) else {
            continue;
        };
        if let Some(own) = page.meta.get_str("series_title") {
            title = Some(own.to_owned());
        }
        let current = title
            .get_or_insert_with(|| page.title().unwrap_or(name).to_owned())
            .clone();

        let mut info = MetaTable::new();
        info.set("name", name);
        info.set("index", (i + 1) as i64);
        info.set("length", keys.len() as i64);
        info.set("first", reference(Some(0)));
        info.set("last", reference(keys.len().checked_sub(1)));
        info.set("prev", reference(i.checked_sub(1)));
        info.set("next", reference(Some(i + 1)));
        info.set("title", current);
        infos.push((key.clone(), info));
    }
    infos
}
