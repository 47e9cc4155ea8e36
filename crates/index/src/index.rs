//! Vector Index: embeds chunks once, then answers nearest-neighbour queries.
//!
//! The index is published atomically: until [`VectorIndex::build`] has
//! embedded every chunk, queries fail with [`QueryError::NotBuilt`]. After
//! that the entries are immutable and read without locks.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use trialscout_core::error::{BuildError, QueryError};
use trialscout_core::{DomainEvent, Embedder, EventBus};

use crate::chunker::Chunk;
use crate::similarity::cosine_similarity;

pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
pub const DEFAULT_TOP_K: usize = 4;

/// Summary of a completed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Distinct source documents among the indexed chunks
    pub documents: usize,
    pub chunks: usize,
    pub dimensions: usize,
    /// Embedding requests issued
    pub batches: usize,
    pub duration_ms: u64,
}

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexEntry {
    embedding: Vec<f32>,
    chunk: Chunk,
}

struct Built {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    stats: IndexStats,
}

/// Cosine-similarity index over study chunks.
pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    events: Option<Arc<EventBus>>,
    building: AtomicBool,
    built: OnceLock<Built>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("embedder", &self.embedder.name())
            .field("batch_size", &self.batch_size)
            .field("built", &self.is_built())
            .field("len", &self.len())
            .finish()
    }
}

/// Clears the in-progress flag unless the build completed.
struct BuildGuard<'a> {
    flag: &'a AtomicBool,
    finished: bool,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.flag.store(false, Ordering::SeqCst);
        }
    }
}

impl VectorIndex {
    /// Create an unbuilt index that embeds through `embedder`.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
            events: None,
            building: AtomicBool::new(false),
            built: OnceLock::new(),
        }
    }

    /// Chunks per embedding request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    /// Number of indexed chunks (0 before build).
    pub fn len(&self) -> usize {
        self.built.get().map_or(0, |b| b.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> Option<&IndexStats> {
        self.built.get().map(|b| &b.stats)
    }

    /// Embed every chunk and publish the index. Callable once.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<IndexStats, BuildError> {
        if self.built.get().is_some() || self.building.swap(true, Ordering::SeqCst) {
            return Err(BuildError::AlreadyBuilt);
        }
        let mut guard = BuildGuard {
            flag: &self.building,
            finished: false,
        };

        let built = self.embed_all(chunks).await?;
        let stats = built.stats.clone();
        if self.built.set(built).is_err() {
            return Err(BuildError::AlreadyBuilt);
        }
        guard.finished = true;

        info!(
            embedder = %self.embedder.name(),
            documents = stats.documents,
            chunks = stats.chunks,
            dimensions = stats.dimensions,
            duration_ms = stats.duration_ms,
            "Vector index built"
        );

        if let Some(events) = &self.events {
            events.publish(DomainEvent::IndexBuilt {
                documents: stats.documents,
                chunks: stats.chunks,
                dimensions: stats.dimensions,
                duration_ms: stats.duration_ms,
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(stats)
    }

    async fn embed_all(&self, chunks: Vec<Chunk>) -> Result<Built, BuildError> {
        let started = Instant::now();
        let total = chunks.len();
        let documents = chunks
            .iter()
            .map(|c| c.document_index)
            .collect::<HashSet<_>>()
            .len();

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(total);
        let mut dimensions: Option<usize> = None;
        let mut batches = 0;
        let mut pending = chunks.into_iter().peekable();

        while pending.peek().is_some() {
            let batch: Vec<Chunk> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(BuildError::CountMismatch {
                    expected: batch.len(),
                    actual: vectors.len(),
                });
            }

            for (chunk, embedding) in batch.into_iter().zip(vectors) {
                let expected = *dimensions.get_or_insert(embedding.len());
                if embedding.len() != expected {
                    return Err(BuildError::DimensionMismatch {
                        chunk: entries.len(),
                        expected,
                        actual: embedding.len(),
                    });
                }
                entries.push(IndexEntry { embedding, chunk });
            }

            batches += 1;
            debug!(batch = batches, embedded = entries.len(), total, "Embedded chunk batch");
        }

        let dimensions = dimensions.unwrap_or(0);
        let stats = IndexStats {
            documents,
            chunks: entries.len(),
            dimensions,
            batches,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        Ok(Built {
            entries,
            dimensions,
            stats,
        })
    }

    /// The `k` chunks most similar to `text`, best first. Equal scores keep
    /// index order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, QueryError> {
        let built = self.built.get().ok_or(QueryError::NotBuilt)?;
        if k == 0 {
            return Err(QueryError::InvalidK);
        }
        if built.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed_one(text).await?;
        if query.len() != built.dimensions {
            return Err(QueryError::DimensionMismatch {
                expected: built.dimensions,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = built
            .entries
            .iter()
            .map(|entry| (cosine_similarity(&entry.embedding, &query), entry))
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        debug!(k, returned = scored.len(), "Index query");

        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Like [`query`](Self::query) but returns only the chunk texts.
    pub async fn query_texts(&self, text: &str, k: usize) -> Result<Vec<String>, QueryError> {
        Ok(self
            .query(text, k)
            .await?
            .into_iter()
            .map(|s| s.chunk.text)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use trialscout_core::error::ProviderError;

    /// Maps known texts to fixed vectors; unknown text gets `[0, 0, 1]`.
    struct TableEmbedder {
        table: Vec<(&'static str, Vec<f32>)>,
        calls: Mutex<Vec<usize>>,
    }

    impl TableEmbedder {
        fn new(table: Vec<(&'static str, Vec<f32>)>) -> Self {
            Self {
                table,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Embedder for TableEmbedder {
        fn name(&self) -> &str {
            "table"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            self.calls.lock().unwrap().push(inputs.len());
            Ok(inputs
                .iter()
                .map(|text| {
                    self.table
                        .iter()
                        .find(|(k, _)| k == text)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_else(|| vec![0.0, 0.0, 1.0])
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    /// Returns one vector fewer than asked, or vectors of growing size.
    struct SloppyEmbedder {
        short_count: bool,
    }

    #[async_trait]
    impl Embedder for SloppyEmbedder {
        fn name(&self) -> &str {
            "sloppy"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            if self.short_count {
                Ok(inputs.iter().skip(1).map(|_| vec![1.0]).collect())
            } else {
                Ok(inputs.iter().enumerate().map(|(i, _)| vec![1.0; i + 1]).collect())
            }
        }
    }

    fn chunk(doc: usize, text: &str) -> Chunk {
        Chunk {
            document_index: doc,
            chunk_index: 0,
            study_id: format!("NCT{doc:03}"),
            start: 0,
            text: text.into(),
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::new(Arc::new(TableEmbedder::new(vec![
            ("asthma inhaler", vec![1.0, 0.0, 0.0]),
            ("lung cancer", vec![0.0, 1.0, 0.0]),
            ("asthma steroid", vec![0.9, 0.1, 0.0]),
            ("asthma?", vec![1.0, 0.0, 0.0]),
            ("equal", vec![0.0, 0.0, 1.0]),
        ])))
    }

    #[tokio::test]
    async fn query_ranks_by_descending_similarity() {
        let index = sample_index();
        let stats = index
            .build(vec![
                chunk(0, "lung cancer"),
                chunk(1, "asthma steroid"),
                chunk(2, "asthma inhaler"),
            ])
            .await
            .unwrap();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.dimensions, 3);

        let results = index.query("asthma?", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "asthma inhaler");
        assert_eq!(results[1].chunk.text, "asthma steroid");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn k_larger_than_index_returns_everything() {
        let index = sample_index();
        index
            .build(vec![chunk(0, "lung cancer"), chunk(0, "asthma inhaler")])
            .await
            .unwrap();
        let texts = index.query_texts("asthma?", 10).await.unwrap();
        assert_eq!(texts, vec!["asthma inhaler", "lung cancer"]);
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let index = sample_index();
        index
            .build(vec![chunk(0, "first"), chunk(1, "second"), chunk(2, "third")])
            .await
            .unwrap();
        let texts = index.query_texts("equal", 3).await.unwrap();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn query_before_build_fails() {
        let index = sample_index();
        let err = index.query("asthma?", 4).await.unwrap_err();
        assert!(matches!(err, QueryError::NotBuilt));
        assert!(!index.is_built());
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let index = sample_index();
        index.build(vec![chunk(0, "lung cancer")]).await.unwrap();
        let err = index.query("asthma?", 0).await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidK));
    }

    #[tokio::test]
    async fn second_build_is_rejected() {
        let index = sample_index();
        index.build(vec![chunk(0, "lung cancer")]).await.unwrap();
        let err = index.build(vec![chunk(1, "asthma inhaler")]).await.unwrap_err();
        assert!(matches!(err, BuildError::AlreadyBuilt));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn empty_build_yields_an_empty_queryable_index() {
        let embedder = Arc::new(TableEmbedder::new(vec![]));
        let index = VectorIndex::new(embedder.clone());
        let stats = index.build(Vec::new()).await.unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.batches, 0);
        assert!(index.is_built());
        assert!(index.is_empty());

        assert!(index.query("asthma?", 4).await.unwrap().is_empty());
        assert!(embedder.calls.lock().unwrap().is_empty());
    }

    /// Scores `NaN` for "broken", 1.0 for everything else.
    struct NanEmbedder;

    #[async_trait]
    impl Embedder for NanEmbedder {
        fn name(&self) -> &str {
            "nan"
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
            Ok(inputs
                .iter()
                .map(|text| {
                    if text == "broken" {
                        vec![f32::NAN, 0.0]
                    } else {
                        vec![1.0, 0.0]
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn nan_scores_do_not_break_ranking() {
        let index = VectorIndex::new(Arc::new(NanEmbedder));
        let chunks: Vec<Chunk> = ["a", "broken", "b", "broken", "c"]
            .iter()
            .enumerate()
            .map(|(i, text)| chunk(i, text))
            .collect();
        index.build(chunks).await.unwrap();

        let results = index.query("query", 5).await.unwrap();
        assert_eq!(results.len(), 5);
        let healthy: Vec<&str> = results
            .iter()
            .filter(|r| !r.score.is_nan())
            .map(|r| r.chunk.text.as_str())
            .collect();
        assert_eq!(healthy, vec!["a", "b", "c"]);
    }

    #[test]
    fn debug_shows_embedder_and_state() {
        let rendered = format!("{:?}", sample_index());
        assert!(rendered.contains("\"table\""));
        assert!(rendered.contains("built: false"));
    }

    #[tokio::test]
    async fn embedder_failure_aborts_build_and_leaves_index_unbuilt() {
        let index = VectorIndex::new(Arc::new(FailingEmbedder));
        let err = index.build(vec![chunk(0, "x")]).await.unwrap_err();
        assert!(matches!(err, BuildError::Embedding(ProviderError::Network(_))));
        assert!(matches!(
            index.query("x", 1).await.unwrap_err(),
            QueryError::NotBuilt
        ));
    }

    #[tokio::test]
    async fn wrong_vector_count_aborts_build() {
        let index = VectorIndex::new(Arc::new(SloppyEmbedder { short_count: true }));
        let err = index.build(vec![chunk(0, "a"), chunk(0, "b")]).await.unwrap_err();
        assert!(matches!(err, BuildError::CountMismatch { expected: 2, actual: 1 }));
    }

    #[tokio::test]
    async fn inconsistent_dimensions_abort_build() {
        let index = VectorIndex::new(Arc::new(SloppyEmbedder { short_count: false }));
        let err = index.build(vec![chunk(0, "a"), chunk(0, "b")]).await.unwrap_err();
        assert!(matches!(
            err,
            BuildError::DimensionMismatch { chunk: 1, expected: 1, actual: 2 }
        ));
    }

    #[tokio::test]
    async fn embeds_in_batches() {
        let embedder = Arc::new(TableEmbedder::new(vec![]));
        let index = VectorIndex::new(embedder.clone()).with_batch_size(2);
        let chunks: Vec<Chunk> = (0..5).map(|i| chunk(i, "x")).collect();
        let stats = index.build(chunks).await.unwrap();
        assert_eq!(stats.batches, 3);
        assert_eq!(*embedder.calls.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn build_publishes_event() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let index = sample_index().with_event_bus(bus.clone());
        index.build(vec![chunk(0, "lung cancer")]).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event.as_ref(), DomainEvent::IndexBuilt { chunks: 1, .. }));
    }
}
