//! Vector store using Qdrant
//!
//! One collection per user, named `user_{user_id}_docs`, created lazily
//! with keyword payload indexes on the filterable metadata fields.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        value::Kind, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, Distance,
        FieldType, SearchPointsBuilder, VectorParamsBuilder,
    },
    Qdrant,
};

use crate::filter::{SearchFilter, FILE_TYPE_KEY, WEEK_START_KEY};
use crate::RagError;

/// Vector store configuration
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Qdrant endpoint
    pub endpoint: String,
    /// Vector dimension
    pub vector_dim: usize,
    /// API key (optional)
    pub api_key: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:6334".to_string(),
            vector_dim: 384,
            api_key: None,
        }
    }
}

/// Search result from the vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// Point ID
    pub id: String,
    /// Similarity score
    pub score: f32,
    /// Chunk content
    pub content: String,
    /// Chunk metadata (file_type, week_start, source, ...)
    pub metadata: HashMap<String, String>,
}

/// Search seam over a single user's collection
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<VectorSearchResult>, RagError>;
}

/// Factory over a shared Qdrant connection handing out per-user
/// collection handles
#[derive(Clone)]
pub struct UserCollections {
    client: Arc<Qdrant>,
    config: VectorStoreConfig,
}

impl UserCollections {
    pub async fn connect(config: VectorStoreConfig) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(&config.endpoint);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }

    /// Handle for one user's collection, creating it if missing
    pub async fn for_user(&self, user_id: &str) -> Result<UserVectorStore, RagError> {
        let store = UserVectorStore {
            client: Arc::clone(&self.client),
            collection: collection_name(user_id),
            vector_dim: self.config.vector_dim,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    /// Reachability probe for health reporting
    pub async fn is_available(&self) -> bool {
        self.client.health_check().await.is_ok()
    }
}

/// Collection name for a user's documents
pub fn collection_name(user_id: &str) -> String {
    format!("user_{}_docs", user_id)
}

/// Handle bound to a single user's collection
pub struct UserVectorStore {
    client: Arc<Qdrant>,
    collection: String,
    vector_dim: usize,
}

impl UserVectorStore {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection and its payload indexes if not present
    async fn ensure_collection(&self) -> Result<(), RagError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection).vectors_config(
                    VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        for field in [FILE_TYPE_KEY, WEEK_START_KEY] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| RagError::VectorStore(e.to_string()))?;
        }

        tracing::info!(collection = %self.collection, "created user collection");
        Ok(())
    }
}

#[async_trait]
impl VectorSearch for UserVectorStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<VectorSearchResult>, RagError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_embedding.to_vec(), top_k as u64)
                .with_payload(true);

        if let Some(f) = filter {
            search_builder = search_builder.filter(f.into_qdrant());
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let search_results = results
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = HashMap::new();
                let mut content = String::new();

                for (k, v) in point.payload {
                    if k == "text" {
                        if let Some(Kind::StringValue(s)) = v.kind {
                            content = s;
                        }
                    } else if let Some(Kind::StringValue(s)) = v.kind {
                        metadata.insert(k, s);
                    }
                }

                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        },
                        None => String::new(),
                    })
                    .unwrap_or_default();

                VectorSearchResult {
                    id,
                    score: point.score,
                    content,
                    metadata,
                }
            })
            .collect();

        Ok(search_results)
    }
}
