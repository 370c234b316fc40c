//! Persistent build cache for incremental rebuilds.
//!
//! Loading a page means reading and parsing its source. This cache remembers
//! the result of that work so an unchanged source is never parsed twice
//! across builds.
//!
//! # Design
//!
//! ```text
//! redb file (build.cache)
//!   table "pages": source path ──▶ JSON { version, fingerprint, entry }
//! ```
//!
//! - One entry per source path. A changed source writes a whole new entry
//!   over the old one; entries are never patched in place.
//! - A hit requires the same format version, the same fingerprint, and the
//!   same build path as the page being loaded now.
//! - Entries of renamed or removed sources are simply never read again.
//!
//! # Failure policy
//!
//! Nothing here can fail a build. An unopenable database disables the cache;
//! a read or decode error is a miss; a failed write is logged and dropped.
//! Deleting the file at any time only costs a full reparse.

use crate::{config::FingerprintMode, log, meta::MetaTable, scan::SourceFile};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;

/// Bump when the stored entry layout changes.
const CACHE_VERSION: u32 = 1;

const PAGES: TableDefinition<&str, &[u8]> = TableDefinition::new("pages");

// ============================================================================
// Types
// ============================================================================

/// The parse result of one source, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub build_path: String,
    pub meta: MetaTable,
    pub body: Option<String>,
}

/// Change detector for one source under one loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the loader identity together with the file's contents or stat.
    ///
    /// `inputs` holds the inherited values the loader reads, so a change in a
    /// directory declaration invalidates the files below it.
    pub fn compute(
        file: &SourceFile,
        feature: &str,
        kind: &str,
        inputs: &MetaTable,
        mode: FingerprintMode,
    ) -> io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(feature.as_bytes());
        hasher.update(&[0]);
        hasher.update(kind.as_bytes());
        hasher.update(&[0]);
        hasher.update(&table_bytes(&file.meta));
        hasher.update(&[0]);
        hasher.update(&table_bytes(inputs));
        match mode {
            FingerprintMode::Content => {
                hasher.update(&fs::read(&file.abs)?);
            }
            FingerprintMode::Mtime => {
                hasher.update(&file.size.to_le_bytes());
                hasher.update(&file.mtime.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
            }
        }
        Ok(Self(hex::encode(hasher.finalize().as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable bytes of a table; keys are ordered.
fn table_bytes(table: &MetaTable) -> Vec<u8> {
    serde_json::to_vec(table).unwrap_or_default()
}

#[derive(Serialize, Deserialize)]
struct Stored {
    version: u32,
    fingerprint: String,
    entry: CacheEntry,
}

#[derive(Debug, Error)]
enum CacheError {
    #[error(transparent)]
    Db(#[from] redb::Error),

    #[error("cannot decode entry: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============================================================================
// BuildCache
// ============================================================================

pub struct BuildCache {
    db: Option<Database>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl BuildCache {
    /// Open or create the database at `path`; on failure the cache is disabled.
    pub fn open(path: &Path) -> Self {
        let db = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .map_err(|e| e.to_string())
            .and_then(|()| Database::create(path).map_err(|e| e.to_string()));
        match db {
            Ok(db) => Self::with_db(Some(db)),
            Err(err) => {
                log!("cache"; "disabled, cannot open {}: {err}", path.display());
                Self::disabled()
            }
        }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self::with_db(None)
    }

    fn with_db(db: Option<Database>) -> Self {
        Self {
            db,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.db.is_some()
    }

    /// Stored entry for `path`, if it was produced from `fingerprint`.
    ///
    /// Safe to call from many threads at once.
    pub fn get(&self, path: &str, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let found = match self.read(path) {
            Ok(Some(stored))
                if stored.version == CACHE_VERSION && stored.fingerprint == fingerprint.0 =>
            {
                Some(stored.entry)
            }
            Ok(_) => None,
            Err(err) => {
                log!("cache"; "{path}: {err}");
                None
            }
        };
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Store one entry.
    pub fn put(&self, path: &str, fingerprint: &Fingerprint, entry: &CacheEntry) {
        self.put_batch([(path, fingerprint, entry)]);
    }

    /// Store many entries in a single transaction.
    ///
    /// The transaction either commits every entry or none of them; entries
    /// committed by earlier builds are untouched either way.
    pub fn put_batch<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, &'a Fingerprint, &'a CacheEntry)>,
    ) {
        let Some(db) = &self.db else {
            return;
        };
        let encoded: Vec<(&str, Vec<u8>)> = entries
            .into_iter()
            .filter_map(|(path, fingerprint, entry)| {
                let stored = Stored {
                    version: CACHE_VERSION,
                    fingerprint: fingerprint.0.clone(),
                    entry: entry.clone(),
                };
                serde_json::to_vec(&stored).ok().map(|bytes| (path, bytes))
            })
            .collect();
        if encoded.is_empty() {
            return;
        }
        if let Err(err) = write_all(db, &encoded) {
            log!("cache"; "write of {} entries dropped: {err}", encoded.len());
        }
    }

    /// (hits, misses) since the cache was opened.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn read(&self, path: &str) -> Result<Option<Stored>, CacheError> {
        let Some(db) = &self.db else {
            return Ok(None);
        };
        let Some(bytes) = read_raw(db, path)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    #[cfg(test)]
    fn put_raw(&self, path: &str, bytes: &[u8]) {
        if let Some(db) = &self.db {
            write_all(db, &[(path, bytes.to_vec())]).unwrap();
        }
    }
}

// ============================================================================
// Internal
// ============================================================================

fn read_raw(db: &Database, path: &str) -> Result<Option<Vec<u8>>, redb::Error> {
    let txn = db.begin_read()?;
    let table = match txn.open_table(PAGES) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(table.get(path)?.map(|value| value.value().to_vec()))
}

fn write_all(db: &Database, entries: &[(&str, Vec<u8>)]) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    {
        let mut table = txn.open_table(PAGES)?;
        for (path, bytes) in entries {
            table.insert(*path, bytes.as_slice())?;
        }
    }
    txn.commit()?;
    Ok(())
}
