//! Built-in features.
//!
//! | Feature | Loads | Analysis | Runs after |
//! |---------|-------|----------|------------|
//! | `markdown` | `*.md` | | |
//! | `data` | `*.json`, `*.toml`, `*.yaml`, `*.yml` with `data_type` | | |
//! | `taxonomy` | `*.taxonomy` | category pages | |
//! | `dirs` | | directory index pages | taxonomy |
//! | `pages` | | `pages` filter expansion | taxonomy, dirs |
//! | `series` | | `series_info` and category sequences | taxonomy |
//! | `syndication` | | feeds and archives | pages, taxonomy |
//! | `nav` | | `nav` reference resolution | dirs, syndication |
//! | `related` | | `related` links | syndication |
//! | `images` | | `image` references | syndication |
//! | `aliases` | | redirect pages | everything above |

mod aliases;
mod data;
mod dirs;
mod images;
mod markdown;
mod nav;
mod pages;
mod related;
mod series;
mod syndication;
mod taxonomy;

pub use markdown::{CommonMark, DocumentParser, Markdown, Parsed};

use crate::{
    feature::FeatureRegistry,
    graph::{PageGraph, PageKey},
    meta::Value,
};
use std::cmp::Ordering;

/// Names of every built-in feature, in registration order.
pub const DEFAULT_FEATURES: &[&str] = &[
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
    "aliases",
];

/// Register every built-in feature.
pub fn register_defaults(registry: &mut FeatureRegistry) {
    registry.register(Box::new(Markdown::new(CommonMark)));
    registry.register(Box::new(data::Data));
    registry.register(Box::new(taxonomy::Taxonomies));
    registry.register(Box::new(dirs::DirIndex));
    registry.register(Box::new(pages::Pages));
    registry.register(Box::new(series::Series));
    registry.register(Box::new(syndication::Syndication));
    registry.register(Box::new(nav::Nav));
    registry.register(Box::new(related::Related));
    registry.register(Box::new(images::Images));
    registry.register(Box::new(aliases::Aliases));
}

/// Built-in features minus the `disabled` names.
pub fn default_registry(disabled: &[String]) -> FeatureRegistry {
    let mut registry = FeatureRegistry::new();
    register_defaults(&mut registry);
    for name in disabled {
        registry.remove(name);
    }
    registry
}

// ============================================================================
// Shared helpers
// ============================================================================

/// A list of page references.
fn page_list(keys: &[PageKey]) -> Value {
    Value::List(keys.iter().cloned().map(Value::Page).collect())
}

/// Keys of a page-reference list, skipping anything else.
fn page_keys(value: &Value) -> Vec<PageKey> {
    value
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_page)
        .cloned()
        .collect()
}

/// Oldest first, key as tiebreak; undated pages sort first.
fn by_date_then_key(graph: &PageGraph, a: &PageKey, b: &PageKey) -> Ordering {
    let date = |k: &PageKey| graph.get(k.as_str()).and_then(|p| p.date());
    date(a).cmp(&date(b)).then_with(|| a.cmp(b))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_schedules() {
        let registry = default_registry(&[]);
        let report = crate::site::BuildReport::quiet();
        let names = registry.schedule(&report).unwrap().names();
        assert_eq!(names.len(), DEFAULT_FEATURES.len());
        assert!(report.is_empty());
        let at = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(at("taxonomy") < at("dirs"));
        assert!(at("pages") < at("syndication"));
        assert!(at("syndication") < at("nav"));
        assert_eq!(names.last(), Some(&"aliases"));
    }

    #[test]
    fn test_disabled_features_are_left_out() {
        let registry = default_registry(&["aliases".into(), "nav".into()]);
        assert!(registry.get("aliases").is_none());
        assert_eq!(registry.len(), DEFAULT_FEATURES.len() - 2);
    }
}
