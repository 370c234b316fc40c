//! Errors of loading and validating `folio.toml`.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value that deserialized but makes no sense, e.g. a relative `site.root`.
    #[error("invalid [{field}]: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("[build.disable] names unknown feature `{name}` (known: {known})")]
    UnknownFeature { name: String, known: String },
}
