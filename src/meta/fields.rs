//! Metadata field declarations.
//!
//! Features declare the keys they read or write. Declaration decides whether
//! a key climbs to directory records when a page does not set it.

use rustc_hash::FxHashMap;

/// One declared metadata key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub inherited: bool,
    pub doc: &'static str,
}

impl Field {
    /// A key pages inherit from their directories.
    pub const fn inherited(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            inherited: true,
            doc,
        }
    }

    /// A key that only ever belongs to the page that sets it.
    pub const fn local(name: &'static str, doc: &'static str) -> Self {
        Self {
            name,
            inherited: false,
            doc,
        }
    }
}

/// Fields every site understands, independent of features.
pub const CORE_FIELDS: &[Field] = &[
    Field::inherited("site_name", "Name of the site"),
    Field::inherited("site_url", "Absolute base URL of the site"),
    Field::inherited("site_root", "URL path the site is served under"),
    Field::inherited("author", "Default author"),
    Field::inherited("template", "Template used to render the page"),
    Field::inherited("ignore", "Glob patterns skipped by the scanner; replaced, never merged"),
    Field::local("title", "Page title"),
    Field::local("description", "Short page summary"),
    Field::local("date", "Publication date; defaults to the source mtime"),
    Field::local("draft", "Draft pages are left out of the build"),
    Field::local("indexed", "Whether the page shows up in page lists"),
];

/// Registry of declared fields.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    map: FxHashMap<&'static str, Field>,
}

impl Fields {
    /// Registry preloaded with [`CORE_FIELDS`].
    pub fn with_core() -> Self {
        let mut fields = Self::default();
        for field in CORE_FIELDS {
            fields.register(*field);
        }
        fields
    }

    /// Register a field; a later registration of the same name wins.
    pub fn register(&mut self, field: Field) {
        self.map.insert(field.name, field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.map.get(name)
    }

    /// Undeclared keys inherit; declared keys follow their declaration.
    pub fn is_inherited(&self, name: &str) -> bool {
        self.map.get(name).is_none_or(|f| f.inherited)
    }

    /// Declared fields sorted by name.
    pub fn iter_sorted(&self) -> Vec<&Field> {
        let mut fields: Vec<_> = self.map.values().collect();
        fields.sort_by_key(|f| f.name);
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_fields_inheritance() {
        let fields = Fields::with_core();
        assert!(fields.is_inherited("author"));
        assert!(!fields.is_inherited("title"));
        assert!(!fields.is_inherited("date"));
    }

    #[test]
    fn test_undeclared_keys_inherit() {
        let fields = Fields::with_core();
        assert!(fields.is_inherited("license"));
    }

    #[test]
    fn test_register_overrides() {
        let mut fields = Fields::with_core();
        fields.register(Field::local("author", "per page"));
        assert!(!fields.is_inherited("author"));
        assert_eq!(fields.get("author").unwrap().doc, "per page");
    }
}
