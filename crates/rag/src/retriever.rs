//! Metadata-filtered retrieval with unfiltered fallback
//!
//! The primary search always carries the category filter (plus the week
//! window when present). If it comes back empty, one unfiltered search
//! runs against the same collection before giving up with the sentinel
//! context.

use std::sync::Arc;

use async_trait::async_trait;

use weeklog_core::{CategorySet, Question, RetrievedContext, Retriever, WeekWindow};

use crate::embeddings::Embedder;
use crate::filter::{SearchFilter, FILE_TYPE_KEY};
use crate::vector_store::{VectorSearch, VectorSearchResult};

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Number of chunks to retrieve
    pub top_k: usize,
    /// Run one unfiltered search when the filtered one is empty
    pub allow_fallback: bool,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            allow_fallback: true,
        }
    }
}

/// Retrieval engine bound to a single user's collection
pub struct RetrievalEngine {
    store: Arc<dyn VectorSearch>,
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
}

impl RetrievalEngine {
    pub fn new(
        store: Arc<dyn VectorSearch>,
        embedder: Arc<dyn Embedder>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }
}

#[async_trait]
impl Retriever for RetrievalEngine {
    async fn retrieve(
        &self,
        question: &Question,
        categories: &CategorySet,
        weeks: &WeekWindow,
    ) -> weeklog_core::Result<RetrievedContext> {
        let embedding = self.embedder.embed(question.as_str())?;
        let filter = SearchFilter::new(categories.clone(), weeks.clone());

        let mut chunks = self
            .store
            .search(&embedding, self.config.top_k, Some(filter))
            .await?;

        if chunks.is_empty() && self.config.allow_fallback {
            tracing::debug!(
                %categories,
                "filtered search empty, falling back to unfiltered"
            );
            chunks = self
                .store
                .search(&embedding, self.config.top_k, None)
                .await?;
        }

        if chunks.is_empty() {
            tracing::debug!(%categories, "no documents found");
            return Ok(RetrievedContext::sentinel(
                question.as_str(),
                categories.clone(),
            ));
        }

        let sources_count = chunks.len();
        tracing::debug!(%categories, sources_count, "retrieved context");

        Ok(RetrievedContext {
            context: format_context(&chunks),
            question: question.as_str().to_string(),
            categories: categories.clone(),
            sources_count,
        })
    }
}

/// Format chunks for prompt inclusion, labelling each with its category
pub fn format_context(chunks: &[VectorSearchResult]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let file_type = chunk
                .metadata
                .get(FILE_TYPE_KEY)
                .map(String::as_str)
                .unwrap_or("unknown");
            format!("[File Type: {}]:\n{}", file_type, chunk.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
