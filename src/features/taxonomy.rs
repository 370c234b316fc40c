//! Taxonomies and their category pages.
//!
//! A `<dir>/<name>.taxonomy` file declares a classification. Pages list their
//! categories under the taxonomy's name:
//!
//! ```yaml
//! # blog/post.md
//! tags: [rust, web]
//! ```
//!
//! Analysis then creates one category page per distinct value:
//!
//! ```text
//! tags.taxonomy        → tags/index.html         categories: [rust, web]
//!   └─ tags/rust       → tags/rust/index.html    pages: [blog/post.md, …]
//!   └─ tags/web        → tags/web/index.html
//! ```
//!
//! Category pages turn on syndication, so each also gets feeds and an
//! archive once the syndication pass runs. Member pages are not linked to
//! category feeds; their own directory feed stays their `rss_feed`.

use super::{by_date_then_key, page_list};
use crate::{
    feature::{Analysis, Feature, LoadInput, Loaded},
    graph::{Page, PageGraph, PageKey, PageKind},
    log,
    meta::{Field, MetaTable, front_matter},
    scan::{DirRecord, SourceFile, join_rel},
};
use anyhow::Result;
use std::collections::BTreeMap;

pub struct Taxonomies;

impl Feature for Taxonomies {
    fn name(&self) -> &'static str {
        "taxonomy"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::local("categories", "Category pages of a taxonomy, sorted by name"),
            Field::local("template_title", "Title of category pages; `{name}` is replaced"),
        ]
    }

    fn claims(&self, file: &SourceFile, _dir: &DirRecord) -> Option<PageKind> {
        (file.extension() == Some("taxonomy")).then_some(PageKind::Taxonomy)
    }

    fn load(&self, input: &LoadInput) -> Result<Option<Loaded>> {
        let text = input.read_to_string()?;
        let mut meta = front_matter::parse_sniffed(&text)?;
        meta.set_default("indexed", false);
        Ok(Some(Loaded { meta, body: None }))
    }

    fn analyze(&self, cx: &mut Analysis) -> Result<()> {
        let taxonomies: Vec<PageKey> = cx
            .graph
            .pages()
            .filter(|p| p.kind == PageKind::Taxonomy)
            .map(|p| p.key.clone())
            .collect();

        let mut created = 0;
        for taxonomy in taxonomies {
            created += populate(cx.graph, &taxonomy)?;
        }
        if created > 0 {
            log!("taxonomy"; "{created} category pages");
        }
        Ok(())
    }
}

/// Create the category pages of one taxonomy. Returns how many.
fn populate(graph: &mut PageGraph, taxonomy: &PageKey) -> Result<usize> {
    let Some(page) = graph.get(taxonomy.as_str()) else {
        return Ok(0);
    };
    let name = taxonomy.stem().to_owned();
    let base = page.site_path().to_owned();
    let template = page
        .meta
        .get_str("template_title")
        .unwrap_or("{name}")
        .to_owned();

    // slug → (display name, members)
    let mut categories: BTreeMap<String, (String, Vec<PageKey>)> = BTreeMap::new();
    for member in graph.pages().filter(|p| p.is_indexed() && p.key != *taxonomy) {
        let Some(value) = member.meta.get(&name) else {
            continue;
        };
        for category in value.string_items() {
            let entry = categories
                .entry(slugify(category))
                .or_insert_with(|| (category.to_owned(), Vec::new()));
            if !entry.1.contains(&member.key) {
                entry.1.push(member.key.clone());
            }
        }
    }

    let dir = graph.dir_for(&base);
    let mut by_name = Vec::with_capacity(categories.len());
    for (slug, (category, mut members)) in categories {
        members.sort_by(|a, b| by_date_then_key(graph, a, b));
        let key = PageKey::new(join_rel(&base, &slug));
        let kind = PageKind::Category {
            taxonomy: taxonomy.clone(),
            name: category.clone(),
        };
        let mut page = Page::derived(key.clone(), kind, dir, taxonomy);
        page.meta.set("title", template.replace("{name}", &category));
        page.meta.set("name", category.as_str());
        page.meta.set("taxonomy", name.as_str());
        page.meta.set("pages", page_list(&members));
        if let Some(date) = graph.newest_date(&members) {
            page.meta.set("date", date);
        }
        let mut syndication = MetaTable::new();
        syndication.set("add_to", false);
        page.meta.set("syndication", syndication);
        page.meta.set("indexed", false);
        graph.insert(page)?;
        by_name.push((category, key));
    }

    by_name.sort();
    let count = by_name.len();
    let keys: Vec<PageKey> = by_name.into_iter().map(|(_, key)| key).collect();
    if let Some(page) = graph.get_mut(taxonomy.as_str()) {
        page.meta.set("categories", page_list(&keys));
    }
    Ok(count)
}

/// Lowercase ASCII slug of a category name.
///
/// Non-ASCII text is transliterated; runs of anything else become one `-`.
fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_owned()
    } else {
        slug.to_owned()
    }
}
