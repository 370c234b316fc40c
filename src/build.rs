//! Command orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── clean output (--clean)
//!     │
//!     ├── load_site()
//!     │       │
//!     │       ├── schedule features ── Cycle is fatal
//!     │       ├── scan + load (rayon, cache) ── Collision / UnreadableRoot are fatal
//!     │       └── analyze in schedule order
//!     │
//!     └── Site::render(BasicRenderer) ──► output/<build_path>
//! ```
//!
//! `check` and `dump-meta` share `load_site()` and stop before rendering.

use crate::{
    cache::BuildCache,
    config::SiteConfig,
    features::default_registry,
    log,
    render::{BasicRenderer, RenderContext, RenderSummary},
    site::{BuildReport, LoadOptions, Pipeline, Site},
};
use anyhow::{Context, Result, bail};
use serde_json::{Map, Value as Json};
use std::{fs, path::Path};

/// Load and analyze the site described by `config`.
pub fn load_site(config: &SiteConfig, cache: &BuildCache) -> Result<Site> {
    let registry = default_registry(&config.build.disable);
    let options = LoadOptions::from_config(config);
    Pipeline::new(options, &registry, cache).load(BuildReport::new())
}

/// Build the site into the configured output directory.
pub fn build_site(config: &SiteConfig, cache: &BuildCache, clean: bool) -> Result<RenderSummary> {
    let output = &config.build.output;
    if clean {
        clean_output(output)?;
    }

    let mut site = load_site(config, cache)?;
    fs::create_dir_all(output)
        .with_context(|| format!("cannot create output directory {}", output.display()))?;
    let summary = site.render(&BasicRenderer, output);

    print_report(&site.report);
    log!("build"; "done, {} pages written to {}", summary.written, output.display());
    Ok(summary)
}

/// Load and analyze without writing anything.
pub fn check_site(config: &SiteConfig, cache: &BuildCache) -> Result<Site> {
    let site = load_site(config, cache)?;
    print_report(&site.report);
    log!("check"; "{} pages, {} warnings", site.graph.len(), site.report.len());
    Ok(site)
}

/// Resolved render contexts of `pages` (every page when empty), keyed by page.
pub fn dump_meta(config: &SiteConfig, cache: &BuildCache, pages: &[String]) -> Result<Json> {
    let site = load_site(config, cache)?;
    let graph = &site.graph;

    let mut dump = Map::new();
    if pages.is_empty() {
        for page in graph.pages() {
            dump.insert(page.key.to_string(), RenderContext::new(graph, page).to_json());
        }
    } else {
        for key in pages {
            let Some(page) = graph.get(key) else {
                bail!("no page `{key}` in the site");
            };
            dump.insert(key.clone(), RenderContext::new(graph, page).to_json());
        }
    }
    Ok(Json::Object(dump))
}

fn clean_output(output: &Path) -> Result<()> {
    if output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("failed to clean output directory {}", output.display()))?;
        log!("build"; "cleaned {}", output.display());
    }
    Ok(())
}

fn print_report(report: &BuildReport) {
    let warnings = report.warnings();
    if warnings.is_empty() {
        return;
    }
    log!("report"; "{} warnings", warnings.len());
    for warning in &warnings {
        eprintln!("  {warning}");
    }
}
