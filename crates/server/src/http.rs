//! HTTP endpoints
//!
//! REST API for the question-answering service.

use std::convert::Infallible;

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    middleware,
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use weeklog_core::{Error, Question, SessionStatus, WeekWindow};

use crate::auth::{auth_middleware, AuthedUser};
use crate::state::AppState;
use crate::stream::to_sse_event;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_origins);

    let api = Router::new()
        .route("/api/qa/ask", post(ask))
        .route("/api/qa/ask/stream", post(ask_stream))
        .route("/api/chats", get(list_chats))
        .route("/api/docs/upload", post(upload_docs))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins; no origins means a
/// permissive layer for development
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        tracing::warn!("No CORS origins configured, allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Error wrapper mapping the pipeline taxonomy onto HTTP statuses
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.0.to_string(),
            "error_type": self.0.error_type(),
        }));

        (status, body).into_response()
    }
}

/// Question request body; `weeks` accepts a single week or a list
#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    chat_id: Option<String>,
    #[serde(default)]
    weeks: WeekWindow,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    response: String,
    chat_id: String,
}

fn parse_question(state: &AppState, raw: &str) -> Result<Question, ApiError> {
    Question::parse(
        raw,
        state.settings.rag.min_question_length,
        state.settings.rag.max_question_length,
    )
    .map_err(ApiError)
}

/// Synchronous question answering
async fn ask(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = parse_question(&state, &request.question)?;
    let chat_id = request
        .chat_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let answer = state
        .orchestrator
        .answer(&question, &user.0, &chat_id, &request.weeks)
        .await?;

    Ok(Json(AskResponse {
        response: answer.response,
        chat_id,
    }))
}

/// Streaming question answering over SSE
async fn ask_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, ApiError> {
    let question = parse_question(&state, &request.question)?;
    let chat_id = request
        .chat_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let rx = state
        .orchestrator
        .answer_stream(question, user.0, chat_id, request.weeks);

    let stream = ReceiverStream::new(rx).map(|event| Ok(to_sse_event(event)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Serialize)]
struct ChatSummary {
    chat_id: String,
    status: SessionStatus,
    exchange_count: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// List the authenticated user's conversations, most recent first
async fn list_chats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let sessions = state.orchestrator.chat_store().list_by_user(&user.0).await?;

    let chats: Vec<ChatSummary> = sessions
        .into_iter()
        .map(|s| ChatSummary {
            chat_id: s.chat_id,
            status: s.status,
            exchange_count: s.exchanges.len(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        })
        .collect();

    Ok(Json(serde_json::json!({
        "count": chats.len(),
        "chats": chats,
    })))
}

#[derive(Debug, Deserialize)]
struct UploadRequest {
    file_paths: Vec<String>,
    week_start: String,
}

/// Dispatch an ingestion job and acknowledge immediately
async fn upload_docs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<UploadRequest>,
) -> Result<Response, ApiError> {
    if request.file_paths.is_empty() {
        return Err(ApiError(Error::Validation(
            "file_paths must not be empty".to_string(),
        )));
    }

    let files = request.file_paths.len();
    state
        .dispatcher
        .dispatch(request.file_paths, &user.0, &request.week_start)
        .await?;

    // New documents must be visible on the next question
    state.orchestrator.invalidate_user(&user.0);

    let body = Json(serde_json::json!({
        "status": "accepted",
        "files": files,
    }));
    Ok((StatusCode::ACCEPTED, body).into_response())
}

/// Liveness plus a reachability summary for the collaborators
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let (llm_available, qdrant_available) =
        tokio::join!(state.llm.is_available(), state.collections.is_available());

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.llm.model_name(),
        "llm_available": llm_available,
        "qdrant_available": qdrant_available,
    }))
}
