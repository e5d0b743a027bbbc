//! Question-answering pipeline
//!
//! Strict Classify -> Retrieve -> Generate staging:
//! - classification resolves faults to the `{personal}` fallback set
//! - retrieval failures terminate the request
//! - generation faults degrade to a fixed apology
//!
//! Per-user retrievers and per-conversation pipelines are cached with a
//! TTL so repeated questions skip collection checks and rebuild work.

pub mod cache;
pub mod classifier;
pub mod generator;
pub mod orchestrator;

pub use cache::TtlCache;
pub use classifier::QuestionClassifier;
pub use generator::{ResponseGenerator, GENERATION_APOLOGY};
pub use orchestrator::{
    Answer, OrchestratorConfig, QaPipeline, QdrantRetrieverFactory, RagOrchestrator,
    RetrieverFactory, StreamEvent,
};
