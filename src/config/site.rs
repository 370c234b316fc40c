//! `[site]` section configuration.
//!
//! Site-wide values that seed the metadata of the content root.

use super::defaults;
use crate::meta::MetaTable;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[site]` section in folio.toml.
///
/// # Example
/// ```toml
/// [site]
/// name = "Notes"
/// url = "https://notes.example.org"
/// root = "/"
/// author = "Alice"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    /// Site name, used as the title of the root index when none is given.
    #[serde(default = "defaults::site::name")]
    #[educe(Default = defaults::site::name())]
    pub name: String,

    /// Absolute base URL, used in feeds.
    #[serde(default = "defaults::site::url")]
    #[educe(Default = defaults::site::url())]
    pub url: Option<String>,

    /// URL path the site is served under.
    #[serde(default = "defaults::site::root")]
    #[educe(Default = defaults::site::root())]
    pub root: String,

    /// Default author for every page.
    #[serde(default)]
    pub author: Option<String>,
}

impl SiteSection {
    /// Metadata every directory inherits from the content root.
    pub fn root_meta(&self) -> MetaTable {
        let mut meta = MetaTable::new();
        meta.set("site_name", self.name.as_str());
        meta.set("site_root", self.root.as_str());
        if let Some(url) = &self.url {
            meta.set("site_url", url.as_str());
        }
        if let Some(author) = &self.author {
            meta.set("author", author.as_str());
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_site_section_full() {
        let config = r#"
            [site]
            name = "Notes"
            url = "https://notes.example.org"
            root = "/notes/"
            author = "Alice"
        "#;
        let config = SiteConfig::from_str(config).unwrap();

        assert_eq!(config.site.name, "Notes");
        assert_eq!(config.site.url.as_deref(), Some("https://notes.example.org"));
        assert_eq!(config.site.root, "/notes/");
        assert_eq!(config.site.author.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_site_section_defaults() {
        let config = SiteConfig::from_str("[site]\n").unwrap();

        assert_eq!(config.site.name, "My site");
        assert_eq!(config.site.root, "/");
        assert!(config.site.url.is_none());
    }

    #[test]
    fn test_root_meta() {
        let config = SiteConfig::from_str(
            "[site]\nname = \"Notes\"\nurl = \"https://n.org\"\nauthor = \"Bob\"\n",
        )
        .unwrap();
        let meta = config.site.root_meta();

        assert_eq!(meta.get_str("site_name"), Some("Notes"));
        assert_eq!(meta.get_str("site_url"), Some("https://n.org"));
        assert_eq!(meta.get_str("site_root"), Some("/"));
        assert_eq!(meta.get_str("author"), Some("Bob"));
    }

    #[test]
    fn test_site_section_rejects_unknown_fields() {
        assert!(SiteConfig::from_str("[site]\ntitle = \"x\"\n").is_err());
    }
}
