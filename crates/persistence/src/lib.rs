//! Persistence layer for weeklog
//!
//! Chat sessions live behind the core `ChatStore` trait. The in-memory
//! implementation here is the default; a database-backed store can
//! replace it without touching the pipeline.

pub mod chat_store;

pub use chat_store::InMemoryChatStore;

use thiserror::Error;

/// Persistence errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<PersistenceError> for weeklog_core::Error {
    fn from(err: PersistenceError) -> Self {
        weeklog_core::Error::Store(err.to_string())
    }
}
