//! File-backed embedding store.

use crate::corpus::Corpus;
use crate::encoder::Encoder;
use crate::index::{LinearScanIndex, NearestNeighborIndex};
use crate::snapshot::{self, EncoderFingerprint};
use crate::types::{Metadata, Record, SearchResults, StoreStats};
use async_trait::async_trait;
use datalens_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Capability interface shared by every embedding store backend.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Embed `texts` and append them with their metadata and ids, in order.
    ///
    /// Either every text is stored and persisted, or nothing changes.
    async fn add_documents(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> AppResult<()>;

    /// Return up to `n_results` records most similar to `query`, best first.
    async fn search(&self, query: &str, n_results: usize) -> AppResult<SearchResults>;

    /// Current record count.
    async fn stats(&self) -> AppResult<StoreStats>;
}

struct State {
    corpus: Corpus,
    index: Box<dyn NearestNeighborIndex>,
}

/// In-process store persisted as a single snapshot file in its directory.
///
/// Writers are serialized by a write lock held across append and persist;
/// searches share a read lock and always see a whole batch or none of it.
/// If the snapshot cannot be written, or the ingesting future is dropped
/// before the write completes, the append is rolled back so memory never
/// runs ahead of disk.
pub struct VectorStore {
    dir: PathBuf,
    encoder: Arc<dyn Encoder>,
    fingerprint: EncoderFingerprint,
    state: RwLock<State>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dir", &self.dir)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open the store in `dir` with the exact linear-scan index.
    pub async fn open(dir: impl AsRef<Path>, encoder: Arc<dyn Encoder>) -> AppResult<Self> {
        Self::open_with_index(dir, encoder, Box::new(LinearScanIndex::new())).await
    }

    /// Open the store in `dir`, creating the directory if needed.
    ///
    /// A missing snapshot starts an empty corpus. A corrupt or incompatible
    /// snapshot is quarantined and also starts an empty corpus; only failing
    /// to create the directory is an error.
    pub async fn open_with_index(
        dir: impl AsRef<Path>,
        encoder: Arc<dyn Encoder>,
        mut index: Box<dyn NearestNeighborIndex>,
    ) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tracing::info!("Opening vector store at {:?}", dir);

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Persistence(format!("Failed to create store directory {:?}: {}", dir, e))
        })?;

        let fingerprint = EncoderFingerprint {
            provider: encoder.provider_name().to_string(),
            model: encoder.model_name().to_string(),
            dimensions: encoder.dimensions(),
        };

        let corpus = match snapshot::load(&dir, fingerprint.dimensions).await {
            Ok(Some(loaded)) => {
                if loaded.provider != fingerprint.provider || loaded.model != fingerprint.model {
                    tracing::warn!(
                        "Snapshot was written by {}/{} but encoder is {}/{}; rankings may be unreliable",
                        loaded.provider,
                        loaded.model,
                        fingerprint.provider,
                        fingerprint.model
                    );
                }
                tracing::info!(
                    "Restored {} records (snapshot saved at {})",
                    loaded.corpus.len(),
                    loaded.saved_at
                );
                loaded.corpus
            }
            Ok(None) => {
                tracing::info!("No snapshot found, starting with an empty corpus");
                Corpus::new()
            }
            Err(e) => {
                tracing::warn!("{}; starting with an empty corpus", e);
                if let Some(moved) = snapshot::quarantine(&dir).await {
                    tracing::warn!("Moved unusable snapshot to {:?}", moved);
                }
                Corpus::new()
            }
        };

        index.extend(0, corpus.embeddings());
        tracing::debug!(
            "Using {} index over {} records of dimension {}",
            index.kind(),
            corpus.len(),
            fingerprint.dimensions
        );

        Ok(Self {
            dir,
            encoder,
            fingerprint,
            state: RwLock::new(State { corpus, index }),
        })
    }

    /// Directory the store persists into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the live snapshot file.
    pub fn snapshot_path(&self) -> PathBuf {
        snapshot::snapshot_path(&self.dir)
    }

    /// Embedding dimension, fixed for the store's lifetime.
    pub fn dimensions(&self) -> usize {
        self.fingerprint.dimensions
    }

    /// Release the store.
    ///
    /// Nothing is written: every successful `add_documents` has already been
    /// persisted, and another process may have saved a newer snapshot since
    /// this one was opened.
    pub async fn close(self) -> AppResult<()> {
        let count = self.state.read().await.corpus.len();
        tracing::info!("Closed vector store at {:?} ({} records)", self.dir, count);
        Ok(())
    }

    async fn encode(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let embeddings = self.encoder.encode(texts).await.map_err(|e| match e {
            AppError::Encoding(_) => e,
            other => AppError::Encoding(other.to_string()),
        })?;
        check_embeddings(&embeddings, texts.len(), self.fingerprint.dimensions)?;
        Ok(embeddings)
    }
}

/// Rows appended to the corpus and index but not yet confirmed on disk.
///
/// Dropped without [`PendingAppend::commit`], including when the ingesting
/// future is cancelled mid-save, it truncates both back to where they were.
struct PendingAppend<'a> {
    state: &'a mut State,
    before: usize,
    committed: bool,
}

impl<'a> PendingAppend<'a> {
    fn new(state: &'a mut State, records: Vec<Record>) -> Self {
        let before = state.corpus.len();
        state.corpus.append(records);
        let State { corpus, index } = &mut *state;
        index.extend(before, &corpus.embeddings()[before..]);
        Self {
            state,
            before,
            committed: false,
        }
    }

    fn added(&self) -> usize {
        self.state.corpus.len() - self.before
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingAppend<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.corpus.truncate(self.before);
            self.state.index.truncate(self.before);
        }
    }
}

/// Reject encoder output of the wrong count, wrong dimension, or with
/// non-finite components.
fn check_embeddings(embeddings: &[Vec<f32>], expected: usize, dimensions: usize) -> AppResult<()> {
    if embeddings.len() != expected {
        return Err(AppError::Encoding(format!(
            "Encoder returned {} embeddings for {} texts",
            embeddings.len(),
            expected
        )));
    }
    for (i, embedding) in embeddings.iter().enumerate() {
        if embedding.len() != dimensions {
            return Err(AppError::Encoding(format!(
                "Embedding {} has dimension {}, expected {}",
                i,
                embedding.len(),
                dimensions
            )));
        }
        if embedding.iter().any(|x| !x.is_finite()) {
            return Err(AppError::Encoding(format!(
                "Embedding {} contains non-finite values",
                i
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl EmbeddingStore for VectorStore {
    async fn add_documents(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
        ids: Vec<String>,
    ) -> AppResult<()> {
        if texts.len() != metadatas.len() || texts.len() != ids.len() {
            return Err(AppError::InvalidInput(format!(
                "texts, metadatas and ids must have equal length (got {}, {}, {})",
                texts.len(),
                metadatas.len(),
                ids.len()
            )));
        }
        if texts.is_empty() {
            return Ok(());
        }

        tracing::debug!("Embedding {} documents", texts.len());
        let embeddings = self.encode(&texts).await?;

        let mut state = self.state.write().await;

        let duplicates = state.corpus.duplicate_ids(&ids);
        if !duplicates.is_empty() {
            tracing::warn!(
                "Storing {} documents with duplicate ids: {:?}",
                duplicates.len(),
                duplicates
            );
        }

        let records: Vec<Record> = texts
            .into_iter()
            .zip(metadatas)
            .zip(ids)
            .zip(embeddings)
            .map(|(((text, metadata), id), embedding)| Record {
                id,
                text,
                metadata,
                embedding,
            })
            .collect();

        let pending = PendingAppend::new(&mut state, records);
        let added = pending.added();

        let saved = snapshot::save(&self.dir, &pending.state.corpus, &self.fingerprint).await;
        if let Err(e) = saved {
            drop(pending);
            tracing::error!("Rolled back ingestion of {} documents: {}", added, e);
            return Err(e);
        }
        pending.commit();

        tracing::info!(
            "Added {} documents, corpus now holds {}",
            added,
            state.corpus.len()
        );
        Ok(())
    }

    async fn search(&self, query: &str, n_results: usize) -> AppResult<SearchResults> {
        if n_results == 0 {
            return Err(AppError::InvalidInput(
                "n_results must be at least 1".to_string(),
            ));
        }

        if self.state.read().await.corpus.is_empty() {
            tracing::debug!("Search on empty corpus");
            return Ok(SearchResults::default());
        }

        let query_embedding = self.encode(&[query.to_string()]).await?.remove(0);

        let state = self.state.read().await;
        let neighbors = state
            .index
            .nearest(state.corpus.embeddings(), &query_embedding, n_results);

        let mut results = SearchResults {
            ids: Vec::with_capacity(neighbors.len()),
            documents: Vec::with_capacity(neighbors.len()),
            metadatas: Vec::with_capacity(neighbors.len()),
            distances: Vec::new(),
        };
        let mut distances = Vec::with_capacity(neighbors.len());
        for neighbor in &neighbors {
            let position = neighbor.position;
            results.ids.push(state.corpus.ids()[position].clone());
            results.documents.push(state.corpus.documents()[position].clone());
            results.metadatas.push(state.corpus.metadatas()[position].clone());
            distances.push(neighbor.distance());
        }
        if !distances.is_empty() {
            results.distances.push(distances);
        }

        tracing::debug!(
            "Search returned {} of {} records (requested {})",
            results.len(),
            state.corpus.len(),
            n_results
        );
        Ok(results)
    }

    async fn stats(&self) -> AppResult<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats {
            document_count: state.corpus.len(),
            dimensions: self.fingerprint.dimensions,
        })
    }
}
