//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    pub fn name() -> String {
        "My site".into()
    }

    pub fn url() -> Option<String> {
        None
    }

    pub fn root() -> String {
        "/".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn content() -> PathBuf {
        "content".into()
    }

    pub fn output() -> PathBuf {
        "web".into()
    }

    pub fn cache() -> PathBuf {
        ".folio-cache/build.redb".into()
    }

    pub fn jobs() -> usize {
        0
    }
}
