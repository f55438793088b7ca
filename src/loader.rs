// 📂 Source loading - existence check + read-through cache
//
// The cache belongs to whoever drives the pipeline (CLI run, TUI session,
// server state). The reconciliation core only ever sees loaded tables.

use crate::error::{ReconError, Result};
use crate::table::{read_csv, read_workbook, SourceFormat, Table};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Fail with one message naming every missing file, before any work is done.
pub fn check_sources_exist(paths: &[&Path]) -> Result<()> {
    let missing: Vec<String> = paths
        .iter()
        .filter(|p| !p.exists())
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ReconError::MissingFiles(missing))
    }
}

// ============================================================================
// LOAD CACHE
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    modified: Option<SystemTime>,
    content_hash: String,
    table: Arc<Table>,
}

/// Read-through cache of parsed tables keyed by (path, mtime, content hash).
///
/// An unchanged mtime is trusted without touching the file contents. A
/// changed mtime forces a read; if the SHA-256 still matches, the cached
/// table is reused and only the recorded mtime is refreshed.
#[derive(Debug, Default)]
pub struct LoadCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Path and mtime matched; nothing was read.
    Hit,
    /// File was read but its content hash matched the cached entry.
    Revalidated,
    /// File was parsed.
    Loaded,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` through the cache.
    pub fn load(&self, path: &Path) -> Result<Arc<Table>> {
        self.load_with_outcome(path).map(|(table, _)| table)
    }

    pub fn load_with_outcome(&self, path: &Path) -> Result<(Arc<Table>, CacheOutcome)> {
        let io_err = |source: std::io::Error| ReconError::Io {
            path: path.to_path_buf(),
            source,
        };

        let key = path.canonicalize().map_err(io_err)?;
        let modified = std::fs::metadata(&key).and_then(|m| m.modified()).ok();

        if let Some(entry) = self.lookup(&key) {
            if modified.is_some() && entry.modified == modified {
                log::debug!("cache hit for {}", key.display());
                return Ok((entry.table, CacheOutcome::Hit));
            }
        }

        let bytes = std::fs::read(&key).map_err(io_err)?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        if let Some(entry) = self.lookup(&key) {
            if entry.content_hash == content_hash {
                log::debug!("cache revalidated for {} (content unchanged)", key.display());
                self.store(key, modified, content_hash, entry.table.clone());
                return Ok((entry.table, CacheOutcome::Revalidated));
            }
        }

        let table = Arc::new(parse_bytes(path, &bytes)?);
        log::info!("loaded {} rows from {}", table.len(), path.display());
        self.store(key, modified, content_hash, table.clone());
        Ok((table, CacheOutcome::Loaded))
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &Path) -> Option<CacheEntry> {
        // A poisoned lock only means a reader panicked; the map is still valid.
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn store(&self, key: PathBuf, modified: Option<SystemTime>, content_hash: String, table: Arc<Table>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                modified,
                content_hash,
                table,
            },
        );
    }
}

fn parse_bytes(path: &Path, bytes: &[u8]) -> Result<Table> {
    match SourceFormat::detect(path) {
        Some(SourceFormat::Csv) => read_csv(bytes).map_err(|source| ReconError::Csv {
            path: path.to_path_buf(),
            source,
        }),
        // Parse the bytes that were hashed so entry and table always agree.
        Some(SourceFormat::Workbook) => read_workbook(Cursor::new(bytes), path),
        None => Err(ReconError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Both input tables, loaded together.
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub repayments: Arc<Table>,
    pub writeoffs: Arc<Table>,
}

/// Check both files exist, then load them through the cache.
pub fn load_sources(cache: &LoadCache, repayments: &Path, writeoffs: &Path) -> Result<SourceTables> {
    check_sources_exist(&[repayments, writeoffs])?;
    Ok(SourceTables {
        repayments: cache.load(repayments)?,
        writeoffs: cache.load(writeoffs)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
