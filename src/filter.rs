//! Page selection.
//!
//! A filter picks pages below the directory of the page that asks:
//!
//! ```yaml
//! pages: "*"                      # path glob only
//! pages:
//!   path: "20*/**"                # glob or ^regex$, relative to the page's directory
//!   sort: "-date"                 # any metadata key; `-` reverses; `url` = site path
//!   limit: 10
//!   tags: [rust]                  # taxonomy name → categories the page must all have
//! ```
//!
//! Only `indexed` pages are candidates and the asking page never selects
//! itself. Pages missing the sort key come last, in key order.

use crate::{
    graph::{PageGraph, PageKey, PageKind},
    meta::{MetaTable, Value},
    scan::Pattern,
};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid path pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("`{key}` must be {expected}")]
    Type { key: String, expected: &'static str },

    #[error("unknown filter key `{0}`")]
    UnknownKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub reverse: bool,
}

impl SortKey {
    pub fn parse(text: &str) -> Self {
        match text.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_owned(),
                reverse: true,
            },
            None => Self {
                field: text.to_owned(),
                reverse: false,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct PageFilter {
    pub path: Option<Pattern>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
    /// (taxonomy name, categories every selected page must have)
    pub taxonomies: Vec<(String, Vec<String>)>,
}

impl PageFilter {
    /// Build a filter from a `pages` value: a path string or a table.
    ///
    /// Table keys besides `path`, `sort` and `limit` must name a taxonomy
    /// present in `graph`.
    pub fn from_value(value: &Value, graph: &PageGraph) -> Result<Self, FilterError> {
        match value {
            Value::String(path) => Ok(Self {
                path: Some(compile(path)?),
                ..Self::default()
            }),
            Value::Table(table) => Self::from_table(table, graph),
            _ => Err(FilterError::Type {
                key: "pages".into(),
                expected: "a path pattern or a table",
            }),
        }
    }

    fn from_table(table: &MetaTable, graph: &PageGraph) -> Result<Self, FilterError> {
        let mut filter = Self::default();
        for (key, value) in table.iter() {
            match key.as_str() {
                "path" => {
                    let path = value.as_str().ok_or_else(|| type_error(key, "a string"))?;
                    filter.path = Some(compile(path)?);
                }
                "sort" => {
                    let sort = value.as_str().ok_or_else(|| type_error(key, "a string"))?;
                    filter.sort = Some(SortKey::parse(sort));
                }
                "limit" => {
                    let limit = value
                        .as_int()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| type_error(key, "a non-negative integer"))?;
                    filter.limit = Some(limit);
                }
                name if is_taxonomy(graph, name) => {
                    let wanted = value.string_items().into_iter().map(str::to_owned).collect();
                    filter.taxonomies.push((name.to_owned(), wanted));
                }
                other => return Err(FilterError::UnknownKey(other.to_owned())),
            }
        }
        Ok(filter)
    }

    /// Keys of the pages selected on behalf of `from`, in final order.
    pub fn select(&self, graph: &PageGraph, from: &PageKey) -> Vec<PageKey> {
        let base = graph.get(from.as_str()).map_or("", |p| p.source_dir());
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{base}/")
        };

        let mut selected: Vec<PageKey> = graph
            .pages()
            .filter(|p| p.key != *from && p.is_indexed())
            .filter(|p| {
                let Some(key) = p.key.as_str().strip_prefix(prefix.as_str()) else {
                    return false;
                };
                match &self.path {
                    None => true,
                    Some(pattern) => {
                        let site = p.site_path().strip_prefix(prefix.as_str()).unwrap_or("");
                        pattern.is_match(key) || (!site.is_empty() && pattern.is_match(site))
                    }
                }
            })
            .filter(|p| {
                self.taxonomies.iter().all(|(name, wanted)| {
                    let have = p.meta.get(name).map(Value::string_items).unwrap_or_default();
                    wanted.iter().all(|w| have.contains(&w.as_str()))
                })
            })
            .map(|p| p.key.clone())
            .collect();

        if let Some(sort) = &self.sort {
            let sort_value = |key: &PageKey| -> Option<Value> {
                if sort.field == "url" {
                    return graph.get(key.as_str()).map(|p| Value::from(p.site_path()));
                }
                graph.lookup(key.as_str(), &sort.field).cloned()
            };
            let mut keyed: Vec<(Option<Value>, PageKey)> =
                selected.into_iter().map(|k| (sort_value(&k), k)).collect();
            keyed.sort_by(|(a, _), (b, _)| match (a, b) {
                (Some(a), Some(b)) if sort.reverse => b.sort_cmp(a),
                (Some(a), Some(b)) => a.sort_cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
            selected = keyed.into_iter().map(|(_, k)| k).collect();
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

fn compile(pattern: &str) -> Result<Pattern, FilterError> {
    Pattern::compile(pattern).map_err(|source| FilterError::Pattern {
        pattern: pattern.to_owned(),
        source,
    })
}

fn type_error(key: &str, expected: &'static str) -> FilterError {
    FilterError::Type {
        key: key.to_owned(),
        expected,
    }
}

fn is_taxonomy(graph: &PageGraph, name: &str) -> bool {
    graph
        .pages()
        .any(|p| p.kind == PageKind::Taxonomy && p.key.stem() == name)
}
