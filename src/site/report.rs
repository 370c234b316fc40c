//! Accumulated per-file problems of one build.

use crate::log;
use parking_lot::Mutex;
use std::fmt;

/// A recoverable problem attributed to a source or page path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Thread-safe warning sink shared by every stage.
///
/// Warnings are logged as they arrive and kept for the final summary.
#[derive(Debug, Default)]
pub struct BuildReport {
    warnings: Mutex<Vec<Warning>>,
    quiet: bool,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A report that records without logging.
    pub fn quiet() -> Self {
        Self {
            warnings: Mutex::default(),
            quiet: true,
        }
    }

    pub fn warn(&self, path: impl Into<String>, message: impl Into<String>) {
        let warning = Warning {
            path: path.into(),
            message: message.into(),
        };
        if !self.quiet {
            log!("warn"; "{warning}");
        }
        self.warnings.lock().push(warning);
    }

    pub fn len(&self) -> usize {
        self.warnings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.lock().is_empty()
    }

    /// Snapshot of the warnings, sorted by path for stable output.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = self.warnings.lock().clone();
        warnings.sort_by(|a, b| a.path.cmp(&b.path));
        warnings
    }

    /// Whether any warning for `path` mentions `needle`.
    pub fn mentions(&self, path: &str, needle: &str) -> bool {
        self.warnings
            .lock()
            .iter()
            .any(|w| w.path == path && w.message.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_report_collects_from_threads() {
        let report = BuildReport::quiet();
        (0..64).into_par_iter().for_each(|i| {
            report.warn(format!("file{i:02}.md"), "bad front matter");
        });
        assert_eq!(report.len(), 64);
        let warnings = report.warnings();
        assert_eq!(warnings[0].path, "file00.md");
        assert!(report.mentions("file10.md", "front matter"));
    }
}
