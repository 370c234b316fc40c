//! Pluggable pipeline features.
//!
//! A [`Feature`] contributes to up to four stages of a build. Every hook has
//! a no-op default, so a feature implements only what it needs:
//!
//! | Hook | Stage | Runs |
//! |------|-------|------|
//! | [`Feature::load_dir_meta`] | directory metadata | sequential, parents first |
//! | [`Feature::claims`] / [`Feature::load`] | page loading | parallel over files |
//! | [`Feature::analyze`] | analysis | sequential, once per build |
//!
//! Features are registered once at startup in a [`FeatureRegistry`]; the
//! registry's [`Schedule`] fixes the order used by every stage.

mod schedule;

pub use schedule::Schedule;

use crate::{
    graph::{PageGraph, PageKind},
    meta::{Field, Fields, MetaTable, Value},
    scan::{DirRecord, DirTree, SourceFile},
    site::{BuildError, BuildReport},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;

// ============================================================================
// Hook Contexts
// ============================================================================

/// Input of [`Feature::load_dir_meta`]: one directory, parents already done.
pub struct DirContext<'a> {
    pub dir: &'a mut DirRecord,
    pub fields: &'a Fields,
    pub report: &'a BuildReport,
}

/// Input of [`Feature::load`]: one claimed source file.
pub struct LoadInput<'a> {
    pub file: &'a SourceFile,
    pub dir: &'a DirRecord,
    pub dirs: &'a DirTree,
    pub fields: &'a Fields,
    pub kind: &'a PageKind,
    pub report: &'a BuildReport,
}

impl LoadInput<'_> {
    /// Value the file would inherit from its directory records.
    pub fn inherited(&self, key: &str) -> Option<&Value> {
        self.dirs.lookup(self.dir.id, key)
    }

    pub fn read_to_string(&self) -> Result<String> {
        fs::read_to_string(&self.file.abs)
            .with_context(|| format!("cannot read {}", self.file.abs.display()))
    }
}

/// What a loader produced for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded {
    pub meta: MetaTable,
    pub body: Option<String>,
}

/// Input of [`Feature::analyze`]: the whole graph.
pub struct Analysis<'a> {
    pub graph: &'a mut PageGraph,
    pub report: &'a BuildReport,
    /// Drafts and future-dated pages are part of this build.
    pub drafts: bool,
    pub now: DateTime<Utc>,
}

// ============================================================================
// Feature
// ============================================================================

pub trait Feature: Send + Sync {
    /// Unique name, used in ordering constraints and `build.disable`.
    fn name(&self) -> &'static str;

    /// Features that must run before this one.
    fn runs_after(&self) -> &[&'static str] {
        &[]
    }

    /// Features that must run after this one.
    fn runs_before(&self) -> &[&'static str] {
        &[]
    }

    /// Metadata keys this feature reads or writes.
    fn fields(&self) -> Vec<Field> {
        Vec::new()
    }

    fn load_dir_meta(&self, _cx: &mut DirContext) -> Result<()> {
        Ok(())
    }

    /// Page kind this feature loads `file` as, if it wants it.
    ///
    /// The first feature in schedule order that claims a file owns it.
    fn claims(&self, _file: &SourceFile, _dir: &DirRecord) -> Option<PageKind> {
        None
    }

    /// Inherited keys [`Feature::load`] reads through [`LoadInput::inherited`].
    ///
    /// Their values are part of the cache fingerprint of every file this
    /// feature loads.
    fn load_inputs(&self) -> &[&'static str] {
        &[]
    }

    /// Parse a claimed file. `Ok(None)` hands the file back; it becomes an asset.
    fn load(&self, _input: &LoadInput) -> Result<Option<Loaded>> {
        Ok(None)
    }

    fn analyze(&self, _cx: &mut Analysis) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// FeatureRegistry
// ============================================================================

#[derive(Default)]
pub struct FeatureRegistry {
    features: Vec<Box<dyn Feature>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature. A feature with the same name is replaced in place.
    pub fn register(&mut self, feature: Box<dyn Feature>) {
        match self.features.iter().position(|f| f.name() == feature.name()) {
            Some(index) => self.features[index] = feature,
            None => self.features.push(feature),
        }
    }

    /// Drop a feature by name. Returns whether it was registered.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.features.len();
        self.features.retain(|f| f.name() != name);
        self.features.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&dyn Feature> {
        self.features
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Core fields plus every field the registered features declare.
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::with_core();
        for feature in &self.features {
            for field in feature.fields() {
                fields.register(field);
            }
        }
        fields
    }

    /// Order the features so every constraint holds.
    ///
    /// Constraints naming unregistered features are reported and ignored.
    pub fn schedule(&self, report: &BuildReport) -> Result<Schedule<'_>, BuildError> {
        schedule::compute(&self.features, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static [&'static str]);

    impl Feature for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn runs_after(&self) -> &[&'static str] {
            self.1
        }

        fn fields(&self) -> Vec<Field> {
            vec![Field::local("series", "series name")]
        }
    }

    #[test]
    fn test_register_replaces_by_name_in_place() {
        let mut registry = FeatureRegistry::new();
        registry.register(Box::new(Named("a", &[])));
        registry.register(Box::new(Named("b", &[])));
        registry.register(Box::new(Named("a", &["b"])));
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.get("a").unwrap().runs_after(), ["b"]);
    }

    #[test]
    fn test_remove() {
        let mut registry = FeatureRegistry::new();
        registry.register(Box::new(Named("a", &[])));
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(registry.is_empty());
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_fields_include_core_and_declared() {
        let mut registry = FeatureRegistry::new();
        registry.register(Box::new(Named("a", &[])));
        let fields = registry.fields();
        assert!(!fields.is_inherited("series"));
        assert!(!fields.is_inherited("title"));
        assert!(fields.is_inherited("author"));
    }
}
