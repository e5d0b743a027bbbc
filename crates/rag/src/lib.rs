//! Retrieval over per-user Qdrant collections
//!
//! Features:
//! - Dense vector search via Qdrant, one collection per user
//! - Category and week-window metadata filtering
//! - Single-pass unfiltered fallback when the filtered search is empty
//! - Sentinel context when nothing is found at all
//! - Core Retriever trait implementation

pub mod embeddings;
pub mod filter;
pub mod retriever;
pub mod vector_store;

pub use embeddings::{Embedder, EmbeddingConfig, HashEmbedder};
pub use filter::SearchFilter;
pub use retriever::{format_context, RetrievalEngine, RetrieverConfig};
pub use vector_store::{
    UserCollections, UserVectorStore, VectorSearch, VectorSearchResult, VectorStoreConfig,
};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<RagError> for weeklog_core::Error {
    fn from(err: RagError) -> Self {
        weeklog_core::Error::Retrieval(err.to_string())
    }
}
