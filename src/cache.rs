//! Append-only embedding cache.
//!
//! One JSON record per line (`vector_cache.jsonl`): normalized query text,
//! embedding vector, timestamp. Records are never mutated or deleted;
//! repeated queries append a new record and the latest one wins at lookup
//! time. The file is reloaded in full on open, skipping blank or
//! unparseable lines — a truncated trailing record (crash mid-append) is
//! treated as absent rather than failing the load.
//!
//! Single-process, single-writer: each `store` serializes the record first
//! and appends it with one write, so a record either fully appears in the
//! file or not at all.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::embedding::cosine_similarity;
use crate::error::PipelineError;
use crate::models::CacheEntry;

/// Normalize raw query text into the cache key: trim, lowercase, collapse
/// internal whitespace runs. Applied identically on lookup and store so the
/// key is a pure function of the raw query.
pub fn normalize_query(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Flat-file vector cache with exact and nearest-neighbor lookup.
pub struct VectorCache {
    path: PathBuf,
    entries: Vec<CacheEntry>,
}

impl VectorCache {
    /// Open the cache, loading every parseable record from `path`.
    ///
    /// A missing file is an empty cache. Corrupt records are skipped with
    /// a stderr warning; only a real I/O failure is an error.
    pub fn open(path: &Path) -> Result<Self, PipelineError> {
        let mut entries = Vec::new();

        if path.exists() {
            let file = std::fs::File::open(path).map_err(|source| PipelineError::CacheRead {
                path: path.to_path_buf(),
                source,
            })?;

            let mut skipped = 0usize;
            for line in BufReader::new(file).lines() {
                let line = line.map_err(|source| PipelineError::CacheRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<CacheEntry>(line) {
                    Ok(entry) => entries.push(entry),
                    Err(_) => skipped += 1,
                }
            }

            if skipped > 0 {
                eprintln!(
                    "Warning: skipped {} corrupt cache record(s) in {}",
                    skipped,
                    path.display()
                );
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Number of loaded records (duplicates included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact lookup by normalized query text, most-recent entry winning.
    pub fn lookup_exact(&self, raw_query: &str) -> Option<&CacheEntry> {
        let key = normalize_query(raw_query);
        self.entries.iter().rev().find(|e| e.query == key)
    }

    /// Best cosine match over all records. Returns the entry and its
    /// similarity; the caller decides whether it clears the hit threshold.
    pub fn nearest(&self, vector: &[f32]) -> Option<(&CacheEntry, f32)> {
        self.entries
            .iter()
            .map(|e| (e, cosine_similarity(vector, &e.embedding)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Append one record for `raw_query`. The record is serialized up front
    /// and written with a single call so a crash cannot leave a partial
    /// record followed by a valid one.
    pub fn store(&mut self, raw_query: &str, vector: Vec<f32>) -> Result<(), PipelineError> {
        let entry = CacheEntry {
            query: normalize_query(raw_query),
            embedding: vector,
            created_at: Utc::now(),
        };

        let mut line = serde_json::to_string(&entry).map_err(|e| PipelineError::CacheWrite {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        line.push('\n');

        let write = || -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())?;
            file.flush()
        };

        write().map_err(|source| PipelineError::CacheWrite {
            path: self.path.clone(),
            source,
        })?;

        self.entries.push(entry);
        Ok(())
    }
}
