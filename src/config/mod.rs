//! Site configuration management for `folio.toml`.
//!
//! # Sections
//!
//! | Section   | Purpose                                        |
//! |-----------|------------------------------------------------|
//! | `[site]`  | Site-wide metadata seeded into the content root |
//! | `[build]` | Paths, cache, drafts, disabled features         |
//!
//! # Example
//!
//! ```toml
//! [site]
//! name = "Notes"
//! url = "https://notes.example.org"
//!
//! [build]
//! content = "content"
//! output = "web"
//! ```

mod build;
pub mod defaults;
mod error;
mod site;

pub use build::FingerprintMode;
pub use error::ConfigError;

use build::BuildConfig;
use site::SiteSection;

use crate::cli::{Cli, Commands};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing folio.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site-wide metadata
    #[serde(default)]
    pub site: SiteSection,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_str(&content)?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Update configuration with CLI arguments and anchor paths at the root.
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());
        let root = normalize_path(&root);

        if let Commands::Build { build_args } = &cli.command {
            if let Some(output) = &build_args.output {
                self.build.output = output.clone();
            }
            if build_args.drafts {
                self.build.drafts = true;
            }
        }

        self.config_path = normalize_path(&root.join(&cli.config));
        self.build.content = normalize_path(&root.join(&self.build.content));
        self.build.output = normalize_path(&root.join(&self.build.output));
        self.build.cache = normalize_path(&root.join(&self.build.cache));
        self.build.root = Some(root);
    }

    /// Validate configuration values against the set of known features.
    pub fn validate(&self, known_features: &[&str]) -> Result<()> {
        let invalid = |field, reason: &str| ConfigError::Invalid {
            field,
            reason: reason.to_owned(),
        };

        if let Some(url) = &self.site.url
            && !url.starts_with("http")
        {
            bail!(invalid("site.url", "must start with http:// or https://"));
        }

        if !self.site.root.starts_with('/') {
            bail!(invalid("site.root", "must start with `/`"));
        }

        if let Some(unknown) = self
            .build
            .disable
            .iter()
            .find(|name| !known_features.contains(&name.as_str()))
        {
            bail!(ConfigError::UnknownFeature {
                name: unknown.clone(),
                known: known_features.join(", "),
            });
        }

        if self.build.output.starts_with(&self.build.content) {
            bail!(invalid("build.output", "must not live inside [build.content]"));
        }

        Ok(())
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
