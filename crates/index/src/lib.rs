//! # TrialScout Index
//!
//! The retrieval half of TrialScout: study records become documents,
//! documents become overlapping chunks, chunks are embedded once into an
//! immutable cosine-similarity index.
//!
//! [`initialize`] runs the whole pipeline at startup and hands back an
//! [`IndexHandle`] that every consumer receives explicitly.

pub mod chunker;
pub mod document;
pub mod hashing;
pub mod index;
pub mod similarity;

use std::sync::Arc;

use tracing::info;
use trialscout_core::error::BuildError;
use trialscout_core::{Embedder, EventBus, StudyRecord};

pub use chunker::{Chunk, ChunkerError, TextChunk, TextSplitter, chunk_documents};
pub use document::{Document, build_documents, load_records, parse_records};
pub use hashing::HashingEmbedder;
pub use index::{IndexStats, ScoredChunk, VectorIndex};

/// Shared, read-only access to a built index.
pub type IndexHandle = Arc<VectorIndex>;

/// Knobs for the document → chunk → index pipeline.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub embed_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: chunker::DEFAULT_CHUNK_SIZE,
            chunk_overlap: chunker::DEFAULT_CHUNK_OVERLAP,
            embed_batch_size: index::DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

/// Build the index from `records`. Runs once per process, before serving.
pub async fn initialize(
    records: &[StudyRecord],
    settings: &RagSettings,
    embedder: Arc<dyn Embedder>,
) -> Result<IndexHandle, BuildError> {
    initialize_with_events(records, settings, embedder, None).await
}

/// [`initialize`], publishing [`trialscout_core::DomainEvent::IndexBuilt`] on `events`.
pub async fn initialize_with_events(
    records: &[StudyRecord],
    settings: &RagSettings,
    embedder: Arc<dyn Embedder>,
    events: Option<Arc<EventBus>>,
) -> Result<IndexHandle, BuildError> {
    let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)
        .map_err(|e| BuildError::InvalidSettings(e.to_string()))?;

    let documents = build_documents(records);
    let chunks: Vec<Chunk> = chunk_documents(&splitter, &documents).collect();

    info!(
        records = records.len(),
        documents = documents.len(),
        chunks = chunks.len(),
        chunk_size = settings.chunk_size,
        chunk_overlap = settings.chunk_overlap,
        embedder = %embedder.name(),
        "Building vector index"
    );

    let mut index = VectorIndex::new(embedder).with_batch_size(settings.embed_batch_size);
    if let Some(events) = events {
        index = index.with_event_bus(events);
    }
    index.build(chunks).await?;

    Ok(Arc::new(index))
}
