//! RSS/Atom feeds and archive pages.
//!
//! A page setting `syndication` becomes the index of a feed:
//!
//! ```yaml
//! syndication: true
//! # or
//! syndication:
//!   add_to: false          # don't link the feeds from the listed pages
//!   archive: false         # no archive page
//!   title: "Blog feed"     # any other key is feed metadata
//! ```
//!
//! Next to the index (`blog/index.md` → `blog/`) this creates:
//!
//! | Page | Build path |
//! |------|------------|
//! | RSS feed | `blog/index.rss` |
//! | Atom feed | `blog/index.atom` |
//! | archive | `blog/archive/index.html` |
//!
//! Listed pages are the index's `pages` list, or else the indexed pages of
//! its directory, newest `syndication_date` (default `date`) first. Pages
//! with `syndicated: false` and, outside draft builds, pages syndicated in
//! the future are left out.

use crate::{
    feature::{Analysis, Feature},
    graph::{FeedFormat, Page, PageGraph, PageKey, PageKind},
    log,
    meta::{Field, MetaTable, Value},
    scan::join_rel,
    site::BuildReport,
};
use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{page_keys, page_list};

/// Keys of a `syndication` table that configure the feed itself.
const CONTROL_KEYS: &[&str] = &["add_to", "archive"];

pub struct Syndication;

impl Feature for Syndication {
    fn name(&self) -> &'static str {
        "syndication"
    }

    fn runs_after(&self) -> &[&'static str] {
        &["pages", "taxonomy"]
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::local("syndication", "Turns the page into the index of RSS/Atom feeds"),
            Field::local("syndicated", "Whether the page may appear in feeds; defaults to `indexed`"),
            Field::local("syndication_date", "Date shown in feeds; defaults to `date`"),
        ]
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let indices: Vec<(PageKey, Settings)> = cx
            .graph
            .pages()
            .filter_map(|p| Settings::parse(p.meta.get("syndication")?).map(|s| (p.key.clone(), s)))
            .collect();

        let count = indices.len();
        for (index, settings) in indices {
            syndicate(cx, &index, &settings)?;
        }
        if count > 0 {
            log!("syndication"; "{count} feeds");
        }
        Ok(())
    }
}

struct Settings {
    add_to: bool,
    archive: Option<MetaTable>,
    feed_meta: MetaTable,
}

impl Settings {
    /// `None` when syndication is off.
    fn parse(value: &Value) -> Option<Self> {
        let defaults = || Self {
            add_to: true,
            archive: Some(MetaTable::new()),
            feed_meta: MetaTable::new(),
        };
        match value {
            Value::Bool(true) => Some(defaults()),
            Value::String(s) if matches!(s.to_lowercase().as_str(), "yes" | "true" | "1") => {
                Some(defaults())
            }
            Value::Table(table) => {
                let mut settings = defaults();
                settings.add_to = table.get_bool("add_to").unwrap_or(true);
                settings.archive = match table.get("archive") {
                    Some(Value::Bool(false)) => None,
                    Some(Value::Table(meta)) => Some(meta.clone()),
                    _ => Some(MetaTable::new()),
                };
                settings.feed_meta = table
                    .iter()
                    .filter(|(k, _)| !CONTROL_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Some(settings)
            }
            _ => None,
        }
    }
}

fn syndicate(cx: &mut Analysis, index: &PageKey, settings: &Settings) -> Result<()> {
    let graph = &mut *cx.graph;
    let Some(page) = graph.get(index.as_str()) else {
        return Ok(());
    };
    let base = page.site_path().to_owned();
    // Pages derived from a derived index point back at its declaration.
    let origin = page.created_from.clone().unwrap_or_else(|| index.clone());
    let title = graph.title_of(index.as_str());
    let candidates = match page.meta.get("pages") {
        Some(list @ Value::List(_)) => page_keys(list),
        _ => {
            graph
                .pages_in_dir(page.source_dir())
                .filter(|p| p.key != *index && p.is_indexed())
                .map(|p| p.key.clone())
                .collect()
        }
    };
    let listed = syndicated(graph, candidates, cx.drafts, cx.now);
    let newest = graph.newest_date(&listed);

    let dir = graph.dir_for(&base);
    let feed_meta = |extra: &MetaTable| {
        let mut meta = MetaTable::new();
        meta.set("title", title.as_str());
        meta.merge_from(extra);
        meta.set("pages", page_list(&listed));
        meta.set("index", index.clone());
        meta.set("indexed", false);
        if let Some(date) = newest {
            meta.set("date", date);
        }
        meta
    };

    let rss = PageKey::new(join_rel(&base, "index.rss"));
    let atom = PageKey::new(join_rel(&base, "index.atom"));
    for (key, format) in [(&rss, FeedFormat::Rss), (&atom, FeedFormat::Atom)] {
        let mut feed = Page::derived(key.clone(), PageKind::Feed(format), dir, &origin);
        feed.meta = feed_meta(&settings.feed_meta);
        graph.insert(feed)?;
    }

    let mut related = vec![("rss_feed", rss.clone()), ("atom_feed", atom.clone())];
    if let Some(extra) = &settings.archive {
        let key = PageKey::new(join_rel(&base, "archive"));
        let mut archive = Page::derived(key.clone(), PageKind::Archive, dir, &origin);
        archive.meta = feed_meta(extra);
        archive.related.insert("rss_feed".into(), rss);
        archive.related.insert("atom_feed".into(), atom);
        graph.insert(archive)?;
        related.push(("archive", key));
    }

    link(graph, cx.report, index, &related);
    if settings.add_to {
        for key in &listed {
            link(graph, cx.report, key, &related);
        }
    }
    Ok(())
}

/// Candidates that may appear in a feed, newest syndication date first.
fn syndicated(
    graph: &PageGraph,
    candidates: Vec<PageKey>,
    drafts: bool,
    now: DateTime<Utc>,
) -> Vec<PageKey> {
    let mut dated: Vec<(Option<DateTime<Utc>>, PageKey)> = candidates
        .into_iter()
        .filter_map(|key| {
            let page = graph.get(key.as_str())?;
            let syndicated = page.meta.get_bool("syndicated").unwrap_or(page.is_indexed());
            let date = page.meta.get_date("syndication_date").or_else(|| page.date());
            let future = date.is_some_and(|d| d > now);
            (syndicated && (drafts || !future)).then_some((date, key))
        })
        .collect();
    dated.sort_by(|(a, ka), (b, kb)| b.cmp(a).then_with(|| ka.cmp(kb)));
    dated.into_iter().map(|(_, key)| key).collect()
}

fn link(graph: &mut PageGraph, report: &BuildReport, key: &PageKey, related: &[(&str, PageKey)]) {
    let Some(page) = graph.get_mut(key.as_str()) else {
        return;
    };
    for (name, target) in related {
        if let Err(message) = page.set_related(name, target.clone()) {
            report.warn(key.as_str(), message);
        }
    }
}
