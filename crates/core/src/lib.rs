//! Core types and traits for the weeklog question-answering service
//!
//! This crate provides the foundational pieces shared by all other crates:
//! - Life-domain categories and normalized category sets
//! - Validated question text
//! - Conversation sessions and exchanges
//! - The error taxonomy and propagation policy
//! - Trait seams for the pipeline stages and external collaborators

pub mod category;
pub mod conversation;
pub mod error;
pub mod question;
pub mod traits;

pub use category::{Category, CategorySet};
pub use conversation::{
    ChatSession, Exchange, RetrievedContext, SessionStatus, WeekWindow, HISTORY_WINDOW,
    NO_CONTEXT_SENTINEL,
};
pub use error::{Error, Result};
pub use question::Question;

pub use traits::{
    ChatStore, Classifier, Generator, IngestionDispatcher, Retriever, TokenVerifier,
};
