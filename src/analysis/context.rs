//! Analysis context: the query surface over a shared metadata cache.
//!
//! The AnalysisContext provides:
//! - Full-buffer analysis (`analyze`)
//! - Cursor lookup (`analyze_at`)
//! - Reuse of cached results for unchanged content

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::analysis::assembler::{assemble, find_at_position};
use crate::analysis::facts::{DocumentVersion, FunctionMetadata, Position};
use crate::analysis::scanner::ScannedSource;
use crate::cache::{CachedAnalysis, MetadataCache};

/// Analysis entry point for callers holding text buffers.
///
/// Results are cached per document. A cached entry is only reused when both
/// its version and its content fingerprint match the request.
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    cache: Option<Arc<MetadataCache>>,
}

impl AnalysisContext {
    /// Create a context backed by `cache`.
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self { cache: Some(cache) }
    }

    /// Create a context that recomputes every request.
    pub fn uncached() -> Self {
        Self { cache: None }
    }

    pub fn cache(&self) -> Option<&Arc<MetadataCache>> {
        self.cache.as_ref()
    }

    /// Analyze a whole buffer.
    ///
    /// Returns one record per declaration, ordered by start position and
    /// stamped with `version`. Never fails: malformed input yields whatever
    /// could be recovered, empty text yields an empty list.
    #[tracing::instrument(skip_all, fields(document = %document, version = %version))]
    pub fn analyze(
        &self,
        document: &str,
        text: &str,
        version: DocumentVersion,
    ) -> Arc<Vec<FunctionMetadata>> {
        let fingerprint = fingerprint(text);

        if let Some(cache) = &self.cache {
            match cache.get(document) {
                Some(hit) if hit.version == version && hit.fingerprint == fingerprint => {
                    tracing::debug!(functions = hit.functions.len(), "cache hit");
                    return hit.functions;
                }
                Some(stale) => {
                    tracing::debug!(cached_version = %stale.version, "cache entry stale");
                }
                None => tracing::debug!("cache miss"),
            }
        }

        let functions = if text.is_empty() {
            Vec::new()
        } else {
            assemble(&ScannedSource::scan(text), version)
        };
        let functions = Arc::new(functions);
        tracing::debug!(functions = functions.len(), "analyzed buffer");

        if let Some(cache) = &self.cache {
            cache.set(
                document,
                CachedAnalysis {
                    version,
                    fingerprint,
                    functions: Arc::clone(&functions),
                },
            );
        }

        functions
    }

    /// Find the declaration containing `position`.
    ///
    /// When declarations nest, the innermost one is returned.
    #[tracing::instrument(skip_all, fields(document = %document, version = %version, line = position.line, character = position.character))]
    pub fn analyze_at(
        &self,
        document: &str,
        text: &str,
        version: DocumentVersion,
        position: Position,
    ) -> Option<FunctionMetadata> {
        let functions = self.analyze(document, text, version);
        find_at_position(&functions, position).cloned()
    }
}

fn fingerprint(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
