//! `[build]` section configuration.
//!
//! Source and output locations, cache placement, and pipeline knobs.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Enums
// ============================================================================

/// What the build cache hashes to decide whether a source changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Hash the file contents (default).
    #[default]
    Content,
    /// Hash modification time and size only; cheaper, trusts the filesystem.
    Mtime,
}

// ============================================================================
// BuildConfig
// ============================================================================

/// `[build]` section in folio.toml.
///
/// # Example
/// ```toml
/// [build]
/// content = "content"
/// output = "web"
/// cache = ".folio-cache/build.redb"
/// fingerprint = "mtime"
/// disable = ["aliases"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Content source directory.
    #[serde(default = "defaults::build::content")]
    #[educe(Default = defaults::build::content())]
    pub content: PathBuf,

    /// Build output directory.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Build cache database file.
    #[serde(default = "defaults::build::cache")]
    #[educe(Default = defaults::build::cache())]
    pub cache: PathBuf,

    /// Change detection strategy for the build cache.
    #[serde(default)]
    pub fingerprint: FingerprintMode,

    /// Keep pages marked as drafts (or dated in the future).
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub drafts: bool,

    /// Loader/renderer threads; 0 lets rayon decide.
    #[serde(default = "defaults::build::jobs")]
    #[educe(Default = defaults::build::jobs())]
    pub jobs: usize,

    /// Built-in features to leave out of the pipeline.
    #[serde(default)]
    pub disable: Vec<String>,
}
