//! Structured data pages.
//!
//! A `.json`, `.toml`, `.yaml` or `.yml` file whose table (or directory)
//! sets `data_type` becomes a page with the file's table as metadata. Without
//! `data_type` the file is handed back and copied as an asset.

use crate::{
    feature::{Feature, LoadInput, Loaded},
    graph::PageKind,
    meta::{Field, front_matter::{self, Format}},
    scan::{DirRecord, SourceFile},
};
use anyhow::{Context, Result};

pub struct Data;

impl Feature for Data {
    fn name(&self) -> &'static str {
        "data"
    }

    fn fields(&self) -> Vec<Field> {
        vec![Field::inherited(
            "data_type",
            "Kind of record a data file holds; files without one are assets",
        )]
    }

    fn claims(&self, file: &SourceFile, _dir: &DirRecord) -> Option<PageKind> {
        file.extension()
            .and_then(Format::from_extension)
            .map(|_| PageKind::Data)
    }

    fn load_inputs(&self) -> &[&'static str] {
        &["data_type"]
    }

    fn load(&self, input: &LoadInput) -> Result<Option<Loaded>> {
        let Some(format) = input.file.extension().and_then(Format::from_extension) else {
            return Ok(None);
        };
        let text = input.read_to_string()?;
        let mut meta = front_matter::parse_data(format, &text)
            .with_context(|| format!("cannot parse {}", input.file.rel))?;

        if !meta.contains("data_type") && input.inherited("data_type").is_none() {
            return Ok(None);
        }
        meta.set_default("indexed", true);
        Ok(Some(Loaded { meta, body: None }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        meta::{Fields, MetaTable},
        scan::{DirId, DirTree},
        site::BuildReport,
    };
    use std::fs;
    use tempfile::TempDir;

    fn load(tree: &DirTree, name: &str, content: &str, tmp: &TempDir) -> Result<Option<Loaded>> {
        let abs = tmp.path().join(name);
        fs::write(&abs, content).unwrap();
        let mut file = tree.root().files[0].clone();
        file.rel = name.into();
        file.abs = abs;
        let fields = Fields::with_core();
        let report = BuildReport::quiet();
        Data.load(&LoadInput {
            file: &file,
            dir: tree.root(),
            dirs: tree,
            fields: &fields,
            kind: &PageKind::Data,
            report: &report,
        })
    }

    fn tree(meta: MetaTable) -> DirTree {
        let mut tree = DirTree::single(meta);
        tree.add_file(DirId::ROOT, "placeholder");
        tree
    }

    #[test]
    fn test_data_type_in_file() {
        let tmp = TempDir::new().unwrap();
        let loaded = load(
            &tree(MetaTable::new()),
            "alice.yaml",
            "data_type: person\nname: Alice\n",
            &tmp,
        )
        .unwrap()
        .unwrap();
        assert_eq!(loaded.meta.get_str("name"), Some("Alice"));
        assert!(loaded.body.is_none());
    }

    #[test]
    fn test_data_type_from_directory() {
        let tmp = TempDir::new().unwrap();
        let mut meta = MetaTable::new();
        meta.set("data_type", "person");
        let loaded = load(&tree(meta), "bob.toml", "name = \"Bob\"\n", &tmp).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn test_without_data_type_is_handed_back() {
        let tmp = TempDir::new().unwrap();
        let loaded = load(&tree(MetaTable::new()), "x.json", "{\"a\": 1}", &tmp).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_malformed_data_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load(&tree(MetaTable::new()), "bad.json", "{nope", &tmp).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
