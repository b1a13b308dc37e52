//! Embedding vector store for datalens.
//!
//! Persists text-chunk embeddings and answers nearest-neighbour queries
//! against them:
//!
//! ```text
//! texts + metadata + ids
//!     │
//!     ├──> Encoder (trigram | ollama)
//!     │      └─> Vec<f32; D>
//!     │
//!     ├──> Corpus (parallel columns, append-only)
//!     │      └─> NearestNeighborIndex (exact linear scan)
//!     │
//!     └──> Snapshot (<dir>/snapshot.json, checksummed, atomic rename)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use datalens_core::EncoderConfig;
//! use datalens_store::{create_encoder, EmbeddingStore, Metadata, VectorStore};
//!
//! # async fn run() -> datalens_core::AppResult<()> {
//! let encoder = create_encoder(&EncoderConfig::default())?;
//! let store = VectorStore::open("./vector_db", encoder).await?;
//!
//! store
//!     .add_documents(
//!         vec!["North region revenue grew 12%".to_string()],
//!         vec![Metadata::new()],
//!         vec!["sales_0".to_string()],
//!     )
//!     .await?;
//!
//! let results = store.search("revenue growth", 5).await?;
//! println!("confidence {:.2}", results.confidence());
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod corpus;
pub mod encoder;
pub mod index;
pub mod snapshot;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use corpus::Corpus;
pub use encoder::{create_encoder, Encoder};
pub use index::{cosine_similarity, LinearScanIndex, NearestNeighborIndex, Neighbor};
pub use store::{EmbeddingStore, VectorStore};
pub use types::{Metadata, MetadataValue, Record, SearchResults, StoreStats};
