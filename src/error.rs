//! Pipeline error taxonomy.
//!
//! Failures are split by blast radius: extraction and region resolution
//! abort the whole query, per-site enrichment failures drop a single site,
//! and cache failures never abort anything (the cache is best-effort).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The language model call failed or returned something unparseable.
    /// Aborts the query; there is no automatic retry.
    #[error("field extraction failed: {0}")]
    Extraction(String),

    /// The region name did not match any entry in the area-code table.
    /// Surfaced to the user as an empty result, not a crash.
    #[error("no region code found for '{0}'")]
    RegionNotFound(String),

    /// A per-site detail fetch failed. Non-fatal: the site is dropped
    /// from the listing and the remaining sites are still enriched.
    #[error("enrichment failed for site {content_id}: {source}")]
    Enrichment {
        content_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The cache file could not be read at all (I/O, not record corruption;
    /// corrupt records are skipped on load instead).
    #[error("cache read failed at {path}: {source}")]
    CacheRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending to the cache file failed. Indicates a disk or permission
    /// problem; surfaced as a warning by the pipeline, never as an abort.
    #[error("cache write failed at {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tourism API call failed in transport or returned an unexpected
    /// shape (e.g. an HTML error page instead of JSON).
    #[error("tourism API error: {0}")]
    Api(String),
}

impl PipelineError {
    /// Whether this error aborts the whole query (as opposed to dropping
    /// a single site or degrading the cache).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Extraction(_)
                | PipelineError::RegionNotFound(_)
                | PipelineError::Api(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_split() {
        assert!(PipelineError::Extraction("boom".into()).is_fatal());
        assert!(PipelineError::RegionNotFound("아틀란티스".into()).is_fatal());
        assert!(!PipelineError::Enrichment {
            content_id: "12345".into(),
            source: anyhow::anyhow!("timeout"),
        }
        .is_fatal());
        assert!(!PipelineError::CacheWrite {
            path: "vector_cache.jsonl".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .is_fatal());
    }
}
