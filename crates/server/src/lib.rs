//! HTTP server for weeklog
//!
//! Thin glue over the qa pipeline: bearer-token auth, request
//! validation, SSE framing for the streaming path, and the ingestion
//! dispatch endpoint.

pub mod auth;
pub mod dispatch;
pub mod http;
pub mod state;
pub mod stream;

pub use auth::{DevTokenVerifier, HttpTokenVerifier};
pub use dispatch::SpawnedIngestionDispatcher;
pub use http::create_router;
pub use state::AppState;
