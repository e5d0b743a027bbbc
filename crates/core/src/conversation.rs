//! Conversation sessions, retrieved context, and week windows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategorySet;

/// Sentinel context used when retrieval finds nothing, so generation
/// prompts stay well-formed. Never replaced by an empty string.
pub const NO_CONTEXT_SENTINEL: &str =
    "No relevant documents found in your personal knowledge base.";

/// Number of most recent exchanges included when history is formatted
/// for a prompt. Storage keeps the full history regardless.
pub const HISTORY_WINDOW: usize = 10;

/// An optional restriction of retrieval to specific ISO weeks
/// (e.g. "2024-W01"). Empty means no time restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WeekWindow(Vec<String>);

impl WeekWindow {
    pub fn none() -> Self {
        WeekWindow(Vec::new())
    }

    /// Normalize: blank entries stripped, order preserved
    pub fn new(weeks: impl IntoIterator<Item = String>) -> Self {
        WeekWindow(
            weeks
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

// Accepts both a bare string and a list of strings, matching the API
// contract where `weeks` may be either.
impl<'de> Deserialize<'de> for WeekWindow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            None => WeekWindow::none(),
            Some(OneOrMany::One(week)) => WeekWindow::new([week]),
            Some(OneOrMany::Many(weeks)) => WeekWindow::new(weeks),
        })
    }
}

/// The context bundle assembled by retrieval and consumed by generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedContext {
    /// Formatted context text; the sentinel string when nothing was found
    pub context: String,
    /// The question echoed through the pipeline
    pub question: String,
    /// Categories the retrieval was filtered on
    pub categories: CategorySet,
    /// Number of chunks actually used (0 on the sentinel path)
    pub sources_count: usize,
}

impl RetrievedContext {
    /// The explicit empty-context bundle
    pub fn sentinel(question: impl Into<String>, categories: CategorySet) -> Self {
        Self {
            context: NO_CONTEXT_SENTINEL.to_string(),
            question: question.into(),
            categories,
            sources_count: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.sources_count == 0
    }
}

/// A single question/answer exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user_input: String,
    pub assistant_response: String,
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    pub fn new(user_input: impl Into<String>, assistant_response: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            assistant_response: assistant_response.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Archived,
}

/// A conversation session owned by a (user_id, chat_id) pair.
///
/// The store is the single source of truth for history; the generator
/// only ever appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub chat_id: String,
    pub user_id: String,
    pub exchanges: Vec<Exchange>,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(user_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            exchanges: Vec::new(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// The most recent exchanges, truncated to the prompt window.
    /// A read-time view only; stored history is never truncated.
    pub fn recent_exchanges(&self) -> &[Exchange] {
        let start = self.exchanges.len().saturating_sub(HISTORY_WINDOW);
        &self.exchanges[start..]
    }

    /// Format recent history as alternating "User:"/"Assistant:" lines
    /// for prompt inclusion.
    pub fn format_history(&self) -> String {
        self.recent_exchanges()
            .iter()
            .map(|e| format!("User: {}\nAssistant: {}", e.user_input, e.assistant_response))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
