//! Structural errors that abort a build.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that halt the whole build. Everything else becomes a warning.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("feature ordering cycle: {} ({})", .features.join(" -> "), .constraints.join("; "))]
    Cycle {
        features: Vec<String>,
        constraints: Vec<String>,
    },

    #[error("output path collision at `{build_path}`: `{existing}` and `{incoming}`")]
    Collision {
        build_path: String,
        existing: String,
        incoming: String,
    },

    #[error("cannot read site root `{}`", .path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
