//! Trait seams for pipeline stages and external collaborators
//!
//! The pipeline is a small closed set of stage traits composed
//! explicitly by the orchestrator. All collaborators sit behind traits
//! so they can be mocked in tests and swapped at runtime.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::category::CategorySet;
use crate::conversation::{ChatSession, Exchange, RetrievedContext, WeekWindow};
use crate::error::Result;
use crate::question::Question;

/// Maps a question to one or more life-domain categories.
///
/// Classification cannot fail from the caller's perspective: transport
/// and parsing faults resolve internally to the fallback set.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, question: &Question) -> CategorySet;
}

/// Executes metadata-filtered retrieval against the user's document set.
///
/// Index-access failures propagate: generation must never run on an
/// unknown context state.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        question: &Question,
        categories: &CategorySet,
        weeks: &WeekWindow,
    ) -> Result<RetrievedContext>;
}

/// Synthesizes an answer from question, context, and conversation
/// history, appending the exchange to the session on success.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Synchronous generation. Completion-service failures resolve to a
    /// fixed apology string, never an error.
    async fn generate(
        &self,
        question: &Question,
        context: &RetrievedContext,
        user_id: &str,
        chat_id: &str,
    ) -> String;

    /// Streaming generation: fragments are forwarded through `tx` as
    /// they arrive. Returns the full assembled text, which has been
    /// appended to history. A mid-stream failure returns an error and
    /// appends nothing.
    async fn generate_stream(
        &self,
        question: &Question,
        context: &RetrievedContext,
        user_id: &str,
        chat_id: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String>;
}

/// Conversation store collaborator.
///
/// Sessions are owned by their (user_id, chat_id) pair, and every
/// operation is scoped by both, so a client-supplied chat id can never
/// reach another user's session.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get(&self, user_id: &str, chat_id: &str) -> Result<Option<ChatSession>>;

    async fn create(&self, user_id: &str, chat_id: &str) -> Result<ChatSession>;

    /// Implicit upsert: returns the existing session or creates an
    /// empty one. Never an error for a missing session.
    async fn get_or_create(&self, user_id: &str, chat_id: &str) -> Result<ChatSession>;

    async fn append(&self, user_id: &str, chat_id: &str, exchanges: Vec<Exchange>)
        -> Result<()>;

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<ChatSession>>;
}

/// Identity collaborator: resolves a bearer token to a user id or
/// rejects with an authorization failure.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String>;
}

/// Background job collaborator for document ingestion. Returns
/// immediately; the actual ingestion work is out of scope here.
#[async_trait]
pub trait IngestionDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        file_paths: Vec<String>,
        user_id: &str,
        week_start: &str,
    ) -> Result<()>;
}
