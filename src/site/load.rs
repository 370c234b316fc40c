//! Claiming and loading of scanned files.
//!
//! ```text
//! DirTree ──claim()──▶ Vec<Job> ──par_iter(load_one)──▶ Vec<Loaded page + cache write>
//!                          │
//!                          └── dir.asset or unclaimed → Asset, no loader
//! ```

use super::BuildReport;
use crate::{
    cache::{BuildCache, CacheEntry, Fingerprint},
    config::FingerprintMode,
    feature::{Feature, LoadInput, Loaded, Schedule},
    graph::{Page, PageKey, PageKind, PageState, Source, build_path_for},
    meta::{Fields, MetaTable},
    scan::{DirRecord, DirTree, SourceFile},
};
use chrono::{DateTime, Utc};

/// Date keys coerced from strings after loading.
const DATE_KEYS: &[&str] = &["date", "syndication_date"];

/// One scanned file and the feature that will load it.
pub(super) struct Job<'a> {
    pub file: &'a SourceFile,
    pub dir: &'a DirRecord,
    pub feature: Option<&'a dyn Feature>,
    pub kind: PageKind,
}

/// Assign each file to the first feature, in schedule order, that claims it.
pub(super) fn claim<'a>(dirs: &'a DirTree, schedule: &Schedule<'a>) -> Vec<Job<'a>> {
    let mut jobs = Vec::with_capacity(dirs.file_count());
    for dir in dirs.iter() {
        for file in &dir.files {
            let claimed = if dir.asset {
                None
            } else {
                schedule
                    .iter()
                    .find_map(|f| f.claims(file, dir).map(|kind| (f, kind)))
            };
            let (feature, kind) = match claimed {
                Some((feature, kind)) => (Some(feature), kind),
                None => (None, PageKind::Asset),
            };
            jobs.push(Job {
                file,
                dir,
                feature,
                kind,
            });
        }
    }
    jobs
}

/// Shared, read-only state of the loading stage.
pub(super) struct LoadEnv<'a> {
    pub dirs: &'a DirTree,
    pub fields: &'a Fields,
    pub report: &'a BuildReport,
    pub cache: &'a BuildCache,
    pub fingerprint: FingerprintMode,
    pub now: DateTime<Utc>,
}

/// A loaded page, plus the cache entry to store when it was freshly parsed.
pub(super) struct LoadedPage {
    pub page: Page,
    pub store: Option<(Fingerprint, CacheEntry)>,
    pub cached: bool,
}

/// Load one file. `None` when the file is dropped; the reason is in the report.
pub(super) fn load_one(job: &Job, env: &LoadEnv) -> Option<LoadedPage> {
    let file = job.file;
    let Some(feature) = job.feature else {
        return Some(asset(job));
    };

    let build_path = build_path_for(&PageKey::new(file.rel.as_str()), &job.kind);
    let fingerprint = if env.cache.is_enabled() {
        let inputs: MetaTable = feature
            .load_inputs()
            .iter()
            .filter_map(|key| {
                let value = env.dirs.lookup(job.dir.id, key)?;
                Some((key.to_string(), value.clone()))
            })
            .collect();
        match Fingerprint::compute(file, feature.name(), job.kind.label(), &inputs, env.fingerprint) {
            Ok(fingerprint) => Some(fingerprint),
            Err(err) => {
                env.report.warn(&file.rel, format!("unreadable: {err}"));
                return None;
            }
        }
    } else {
        None
    };

    let hit = fingerprint
        .as_ref()
        .and_then(|fp| env.cache.get(&file.rel, fp))
        .filter(|entry| entry.build_path == build_path);
    if let Some(entry) = hit {
        let loaded = Loaded {
            meta: entry.meta,
            body: entry.body,
        };
        return Some(LoadedPage {
            page: finish(job, loaded, env),
            store: None,
            cached: true,
        });
    }

    let input = LoadInput {
        file,
        dir: job.dir,
        dirs: env.dirs,
        fields: env.fields,
        kind: &job.kind,
        report: env.report,
    };
    match feature.load(&input) {
        Ok(Some(loaded)) => {
            let store = fingerprint.map(|fp| {
                let entry = CacheEntry {
                    build_path,
                    meta: loaded.meta.clone(),
                    body: loaded.body.clone(),
                };
                (fp, entry)
            });
            Some(LoadedPage {
                page: finish(job, loaded, env),
                store,
                cached: false,
            })
        }
        Ok(None) => Some(asset(job)),
        Err(err) => {
            env.report.warn(&file.rel, format!("{err:#}"));
            None
        }
    }
}

fn asset(job: &Job) -> LoadedPage {
    let mut page = Page::new(PageKey::new(job.file.rel.as_str()), PageKind::Asset, job.dir.id);
    page.source = Some(source(job.file));
    page.meta.merge_from(&job.file.meta);
    page.advance(PageState::Loaded);
    LoadedPage {
        page,
        store: None,
        cached: false,
    }
}

/// Turn a loader result into a page: file rules, dates and draft state.
///
/// Runs identically on cache hits and fresh parses.
fn finish(job: &Job, loaded: Loaded, env: &LoadEnv) -> Page {
    let file = job.file;
    let mut meta: MetaTable = loaded.meta;
    meta.merge_from(&file.meta);
    for problem in meta.coerce_dates(DATE_KEYS) {
        env.report.warn(&file.rel, problem);
    }
    meta.set_default("date", file.mtime);
    let future = meta.get_date("date").is_some_and(|date| date > env.now);
    meta.set_default("draft", future);

    let mut page = Page::new(PageKey::new(file.rel.as_str()), job.kind.clone(), job.dir.id);
    page.meta = meta;
    page.body = loaded.body;
    page.source = Some(source(file));
    page.advance(PageState::Loaded);
    page
}

fn source(file: &SourceFile) -> Source {
    Source {
        abs: file.abs.clone(),
        mtime: file.mtime,
    }
}
