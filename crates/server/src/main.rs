//! Weeklog server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use weeklog_config::{load_settings, Settings};
use weeklog_llm::{LlmBackend, LlmConfig, OpenAiBackend, PromptTemplate};
use weeklog_persistence::InMemoryChatStore;
use weeklog_qa::{
    OrchestratorConfig, QdrantRetrieverFactory, QuestionClassifier, RagOrchestrator,
    ResponseGenerator,
};
use weeklog_rag::{EmbeddingConfig, HashEmbedder, RetrieverConfig, UserCollections, VectorStoreConfig};
use weeklog_server::{
    create_router, AppState, DevTokenVerifier, HttpTokenVerifier, SpawnedIngestionDispatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("WEEKLOG_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };
    settings.validate()?;

    init_tracing(&settings);
    tracing::info!("Starting weeklog server v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(settings);

    let backend: Arc<dyn LlmBackend> = Arc::new(OpenAiBackend::new(LlmConfig {
        model: settings.llm.model.clone(),
        endpoint: settings.llm.endpoint.clone(),
        api_key: settings.llm.api_key.clone(),
        max_tokens: settings.llm.max_tokens,
        timeout: Duration::from_secs(settings.llm.timeout_seconds),
        max_retries: settings.llm.max_retries,
        ..Default::default()
    })?);
    tracing::info!(model = %settings.llm.model, "LLM backend initialized");

    let collections = UserCollections::connect(VectorStoreConfig {
        endpoint: settings.qdrant.endpoint.clone(),
        vector_dim: settings.qdrant.vector_dim,
        api_key: settings.qdrant.api_key.clone(),
    })
    .await?;
    tracing::info!(endpoint = %settings.qdrant.endpoint, "Qdrant connection established");

    let embedder = Arc::new(HashEmbedder::new(EmbeddingConfig {
        embedding_dim: settings.qdrant.vector_dim,
        normalize: true,
    }));

    let factory = Arc::new(QdrantRetrieverFactory::new(
        collections.clone(),
        embedder,
        RetrieverConfig {
            top_k: settings.rag.retrieval_k,
            allow_fallback: settings.rag.allow_fallback,
        },
    ));

    let store = Arc::new(InMemoryChatStore::new());

    let classifier = Arc::new(QuestionClassifier::new(
        Arc::clone(&backend),
        settings.rag.classification_prompt.clone(),
        settings.rag.classification_temperature,
    ));

    let generator = Arc::new(ResponseGenerator::new(
        Arc::clone(&backend),
        store.clone(),
        PromptTemplate::new(settings.rag.generation_prompt.clone()),
        settings.rag.generation_temperature,
    ));

    let orchestrator = Arc::new(RagOrchestrator::new(
        classifier,
        generator,
        store,
        factory,
        OrchestratorConfig {
            cache_ttl: Duration::from_secs(settings.rag.cache_ttl_secs),
            streaming_delay: Duration::from_millis(settings.rag.streaming_delay_ms),
            max_concurrent_streams: settings.rag.max_concurrent_streams,
        },
    ));

    let verifier: Arc<dyn weeklog_core::TokenVerifier> =
        match settings.auth.identity_endpoint.clone() {
            Some(endpoint) => {
                tracing::info!(%endpoint, "Using identity service for token verification");
                Arc::new(HttpTokenVerifier::new(
                    endpoint,
                    Duration::from_secs(settings.auth.timeout_seconds),
                )?)
            },
            None => {
                tracing::warn!("No identity endpoint configured, using dev token verifier");
                Arc::new(DevTokenVerifier)
            },
        };

    let state = AppState::new(
        Arc::clone(&settings),
        orchestrator,
        verifier,
        Arc::new(SpawnedIngestionDispatcher),
        backend,
        collections,
    );

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.server.log_level;
        format!("weeklog={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.server.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
