//! The build pipeline.
//!
//! # Stages
//!
//! ```text
//! Pipeline::load()
//!     │
//!     ├── schedule        feature order; a cycle fails here, before any I/O
//!     ├── scan            one walk → DirTree                  (sequential)
//!     ├── dir metadata    load_dir_meta, parents first        (sequential)
//!     ├── claim + load    first claiming feature, cache       (rayon)
//!     ├── insert          single writer into the PageGraph
//!     ├── drafts          dropped unless build.drafts
//!     └── analyze         every feature, schedule order       (sequential)
//!
//! Site::render()          every page → output directory       (rayon)
//! ```
//!
//! # Failure
//!
//! Only [`BuildError`] stops a build: a feature ordering cycle, two pages at
//! one output path, or an unreadable content root. Everything else lands in
//! the [`BuildReport`] and the build goes on.

mod error;
mod load;
mod report;

pub use error::BuildError;
pub use report::{BuildReport, Warning};

use crate::{
    cache::BuildCache,
    config::{FingerprintMode, SiteConfig},
    feature::{Analysis, DirContext, FeatureRegistry},
    graph::{PageGraph, PageState},
    log,
    logger::Progress,
    meta::MetaTable,
    scan,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use load::{LoadEnv, LoadedPage};
use rayon::prelude::*;
use std::path::PathBuf;

/// Inputs of one load, taken from the configuration.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub content: PathBuf,
    /// Metadata of the content root, before its declaration file.
    pub root_meta: MetaTable,
    pub drafts: bool,
    pub fingerprint: FingerprintMode,
    /// Reference time for draft and future-date decisions.
    pub now: DateTime<Utc>,
}

impl LoadOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            content: config.build.content.clone(),
            root_meta: config.site.root_meta(),
            drafts: config.build.drafts,
            fingerprint: config.build.fingerprint,
            now: Utc::now(),
        }
    }
}

/// A loaded and analyzed site.
pub struct Site {
    pub graph: PageGraph,
    pub report: BuildReport,
}

pub struct Pipeline<'a> {
    options: LoadOptions,
    registry: &'a FeatureRegistry,
    cache: &'a BuildCache,
}

impl<'a> Pipeline<'a> {
    pub fn new(options: LoadOptions, registry: &'a FeatureRegistry, cache: &'a BuildCache) -> Self {
        Self {
            options,
            registry,
            cache,
        }
    }

    /// Run every stage up to and including analysis.
    ///
    /// Warnings go to `report`, which is handed back inside the [`Site`].
    pub fn load(&self, report: BuildReport) -> Result<Site> {
        let options = &self.options;
        let schedule = self.registry.schedule(&report)?;
        let fields = self.registry.fields();

        // ====================================================================
        // Scan + directory metadata
        // ====================================================================
        let mut dirs = scan::scan(&options.content, options.root_meta.clone(), &report)?;
        for id in dirs.ids() {
            let mut cx = DirContext {
                dir: dirs.get_mut(id),
                fields: &fields,
                report: &report,
            };
            for feature in schedule.iter() {
                if let Err(err) = feature.load_dir_meta(&mut cx) {
                    let path = cx.dir.path.clone();
                    report.warn(path, format!("{}: {err:#}", feature.name()));
                }
            }
        }

        // ====================================================================
        // Claim + load
        // ====================================================================
        let jobs = load::claim(&dirs, &schedule);
        let env = LoadEnv {
            dirs: &dirs,
            fields: &fields,
            report: &report,
            cache: self.cache,
            fingerprint: options.fingerprint,
            now: options.now,
        };
        let progress = Progress::new("load", jobs.len());
        let loaded: Vec<LoadedPage> = jobs
            .par_iter()
            .filter_map(|job| {
                let page = load::load_one(job, &env);
                progress.inc();
                page
            })
            .collect();
        progress.finish();

        let cached = loaded.iter().filter(|l| l.cached).count();
        self.cache.put_batch(loaded.iter().filter_map(|l| {
            l.store
                .as_ref()
                .map(|(fp, entry)| (l.page.key.as_str(), fp, entry))
        }));

        drop(jobs);
        let mut graph = PageGraph::new(dirs, fields);
        for LoadedPage { page, .. } in loaded {
            graph.insert(page)?;
        }
        log!("load"; "{} pages ({cached} from cache)", graph.len());

        if !options.drafts {
            let dropped = graph.retain(|p| p.meta.get_bool("draft") != Some(true));
            if !dropped.is_empty() {
                log!("load"; "{} drafts left out", dropped.len());
            }
        }

        // ====================================================================
        // Analysis
        // ====================================================================
        let before = graph.len();
        for feature in schedule.iter() {
            let mut cx = Analysis {
                graph: &mut graph,
                report: &report,
                drafts: options.drafts,
                now: options.now,
            };
            feature
                .analyze(&mut cx)
                .with_context(|| format!("feature `{}` failed", feature.name()))?;
        }
        graph.advance_all(PageState::Analyzed);
        log!("analyze"; "{} pages, {} derived", graph.len(), graph.len() - before);

        if self.cache.is_enabled() {
            let (hits, misses) = self.cache.stats();
            log!("cache"; "{hits} hits, {misses} misses");
        }

        Ok(Site { graph, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::Feature,
        features::default_registry,
        graph::{PageKey, PageKind},
        meta::Value,
    };
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &std::path::Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn sample_site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, ".folio", "author: Alice\n");
        write(root, "index.md", "# Home\n");
        write(root, "tags.taxonomy", "template_title: \"Tag {name}\"\n");
        write(root, "blog/index.md", "---\nsyndication: true\n---\n# Blog\n");
        write(
            root,
            "blog/a.md",
            "---\ndate: 2021-01-01\ntags: [rust]\n---\n# First post\n",
        );
        write(
            root,
            "blog/b.md",
            "---\ndate: 2021-02-01\ntags: [rust, web]\naliases: [old-b]\n---\n# Second post\n",
        );
        write(root, "blog/draft.md", "---\ndate: 2999-01-01\n---\n# Later\n");
        write(root, "img/logo.png", "png");
        dir
    }

    fn options(content: &std::path::Path) -> LoadOptions {
        let mut root_meta = MetaTable::new();
        root_meta.set("site_name", "Sample");
        LoadOptions {
            content: content.to_path_buf(),
            root_meta,
            drafts: false,
            fingerprint: FingerprintMode::Content,
            now: Utc::now(),
        }
    }

    fn load(options: LoadOptions, cache: &BuildCache) -> Result<Site> {
        let registry = default_registry(&[]);
        Pipeline::new(options, &registry, cache).load(BuildReport::quiet())
    }

    #[test]
    fn test_load_end_to_end() {
        let dir = sample_site();
        let site = load(options(dir.path()), &BuildCache::disabled()).unwrap();
        let graph = &site.graph;
        assert!(site.report.is_empty(), "{:?}", site.report.warnings());

        let post = graph.get("blog/a.md").unwrap();
        assert_eq!(post.title(), Some("First post"));
        assert_eq!(post.build_path(), "blog/a/index.html");
        assert_eq!(post.state(), PageState::Analyzed);
        assert_eq!(graph.lookup_str("blog/a.md", "author"), Some("Alice"));
        assert_eq!(post.related["rss_feed"].as_str(), "blog/index.rss");

        assert_eq!(graph.get("img/logo.png").unwrap().kind, PageKind::Asset);
        assert_eq!(graph.get("tags/rust").unwrap().title(), Some("Tag rust"));
        assert!(graph.contains("tags/rust/index.rss"));
        assert!(graph.contains("blog/archive"));
        assert!(matches!(
            &graph.get("old-b").unwrap().kind,
            PageKind::Alias { target } if target.as_str() == "blog/b.md"
        ));
        assert!(!graph.contains("blog/draft.md"));
    }

    #[test]
    fn test_drafts_are_kept_on_request() {
        let dir = sample_site();
        let mut options = options(dir.path());
        options.drafts = true;
        let site = load(options, &BuildCache::disabled()).unwrap();
        let draft = site.graph.get("blog/draft.md").unwrap();
        assert_eq!(draft.meta.get("draft"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_cache_hit_matches_fresh_parse() {
        let dir = sample_site();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("build.redb");

        let fresh = {
            let cache = BuildCache::open(&cache_path);
            load(options(dir.path()), &cache).unwrap()
        };
        let cache = BuildCache::open(&cache_path);
        let cached = load(options(dir.path()), &cache).unwrap();
        let (hits, _) = cache.stats();
        assert!(hits >= 4);

        for key in ["index.md", "blog/a.md", "blog/b.md", "tags.taxonomy"] {
            let a = fresh.graph.get(key).unwrap();
            let b = cached.graph.get(key).unwrap();
            assert_eq!(a.meta, b.meta, "{key}");
            assert_eq!(a.body, b.body, "{key}");
            assert_eq!(a.build_path(), b.build_path());
            assert_eq!(
                fresh.graph.lookup("blog/a.md", "author"),
                cached.graph.lookup("blog/a.md", "author")
            );
        }
        assert_eq!(fresh.graph.len(), cached.graph.len());
    }

    #[test]
    fn test_file_rules_apply_on_cache_hits() {
        let dir = sample_site();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("build.redb");
        {
            let cache = BuildCache::open(&cache_path);
            load(options(dir.path()), &cache).unwrap();
        }

        write(dir.path(), "blog/.folio", "files:\n  \"a.md\": { title: Overridden }\n");
        let cache = BuildCache::open(&cache_path);
        let site = load(options(dir.path()), &cache).unwrap();
        assert_eq!(site.graph.get("blog/a.md").unwrap().title(), Some("Overridden"));
        assert_eq!(site.graph.get("blog/b.md").unwrap().title(), Some("Second post"));
    }

    #[test]
    fn test_directory_inputs_invalidate_cache_hits() {
        let dir = sample_site();
        write(dir.path(), "people/.folio", "data_type: person\n");
        write(dir.path(), "people/alice.yaml", "name: Alice\n");
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("build.redb");
        {
            let cache = BuildCache::open(&cache_path);
            let site = load(options(dir.path()), &cache).unwrap();
            assert_eq!(site.graph.get("people/alice.yaml").unwrap().kind, PageKind::Data);
        }

        fs::remove_file(dir.path().join("people/.folio")).unwrap();
        let fresh = load(options(dir.path()), &BuildCache::disabled()).unwrap();
        let cache = BuildCache::open(&cache_path);
        let cached = load(options(dir.path()), &cache).unwrap();
        let kind = |site: &Site| site.graph.get("people/alice.yaml").unwrap().kind.clone();
        assert_eq!(kind(&fresh), PageKind::Asset);
        assert_eq!(kind(&cached), kind(&fresh));
    }

    #[test]
    fn test_collision_is_fatal() {
        let dir = sample_site();
        write(dir.path(), "tags/index.md", "# Clash\n");
        let err = load(options(dir.path()), &BuildCache::disabled())
            .err()
            .expect("collision");
        let Some(BuildError::Collision { build_path, .. }) = err.downcast_ref::<BuildError>()
        else {
            panic!("expected collision, got {err:#}");
        };
        assert_eq!(build_path, "tags/index.html");
    }

    struct Loop(&'static str, &'static str);

    impl Feature for Loop {
        fn name(&self) -> &'static str {
            self.0
        }

        fn runs_after(&self) -> &[&'static str] {
            std::slice::from_ref(&self.1)
        }
    }

    #[test]
    fn test_cycle_fails_before_scanning() {
        let mut registry = default_registry(&[]);
        registry.register(Box::new(Loop("a", "b")));
        registry.register(Box::new(Loop("b", "a")));
        let missing = options(std::path::Path::new("/nonexistent/content"));
        let err = Pipeline::new(missing, &registry, &BuildCache::disabled())
            .load(BuildReport::quiet())
            .err()
            .expect("cycle");
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::Cycle { .. })
        ));
    }

    #[test]
    fn test_unreadable_root_is_fatal() {
        let missing = options(std::path::Path::new("/nonexistent/content"));
        let err = load(missing, &BuildCache::disabled()).err().expect("root");
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnreadableRoot { .. })
        ));
    }

    #[test]
    fn test_malformed_date_is_a_warning() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "post.md", "---\ndate: someday\n---\n# Post\n");
        let site = load(options(dir.path()), &BuildCache::disabled()).unwrap();
        assert!(site.report.mentions("post.md", "date"));
        let post = site.graph.get("post.md").unwrap();
        assert!(post.date().is_some());
        assert_eq!(post.key, PageKey::new("post.md"));
    }
}
