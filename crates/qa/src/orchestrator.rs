//! Pipeline orchestration
//!
//! Owns the two cache namespaces (per-user retrievers, per-conversation
//! pipelines) and drives the Classify -> Retrieve -> Generate stages for
//! both the synchronous and the streaming path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};

use weeklog_core::{
    CategorySet, ChatStore, Classifier, Error, Generator, Question, Result, Retriever, WeekWindow,
};
use weeklog_rag::{
    Embedder, RetrievalEngine, RetrieverConfig, UserCollections,
};

use crate::cache::TtlCache;

/// A completed synchronous answer
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    pub categories: CategorySet,
    pub sources_count: usize,
}

/// Events emitted on the streaming path, in order: status events per
/// stage, chunk events, then exactly one metadata or error event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Status {
        message: String,
    },
    Chunk {
        content: String,
    },
    Metadata {
        classification: Vec<String>,
        sources_used: usize,
        total_chunks: usize,
    },
    Error {
        error: String,
        error_type: String,
    },
}

impl StreamEvent {
    fn status(message: &str) -> Self {
        StreamEvent::Status {
            message: message.to_string(),
        }
    }

    fn from_error(err: &Error) -> Self {
        StreamEvent::Error {
            error: err.to_string(),
            error_type: err.error_type().to_string(),
        }
    }
}

/// Builds a retriever bound to one user's collection
#[async_trait]
pub trait RetrieverFactory: Send + Sync {
    async fn build(&self, user_id: &str) -> Result<Box<dyn Retriever>>;
}

/// Qdrant-backed factory: resolves the per-user collection handle
/// (creating the collection on first sight) and wires it to the shared
/// embedder.
pub struct QdrantRetrieverFactory {
    collections: UserCollections,
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
}

impl QdrantRetrieverFactory {
    pub fn new(
        collections: UserCollections,
        embedder: Arc<dyn Embedder>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            collections,
            embedder,
            config,
        }
    }
}

#[async_trait]
impl RetrieverFactory for QdrantRetrieverFactory {
    async fn build(&self, user_id: &str) -> Result<Box<dyn Retriever>> {
        let store = self.collections.for_user(user_id).await?;
        Ok(Box::new(RetrievalEngine::new(
            Arc::new(store),
            Arc::clone(&self.embedder),
            self.config.clone(),
        )))
    }
}

/// Stages bound to one conversation
pub struct QaPipeline {
    classifier: Arc<dyn Classifier>,
    retriever: Arc<Box<dyn Retriever>>,
    generator: Arc<dyn Generator>,
}

impl QaPipeline {
    pub async fn answer(
        &self,
        question: &Question,
        weeks: &WeekWindow,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Answer> {
        let categories = self.classifier.classify(question).await;
        let context = self
            .retriever
            .retrieve(question, &categories, weeks)
            .await?;
        let response = self
            .generator
            .generate(question, &context, user_id, chat_id)
            .await;

        Ok(Answer {
            response,
            categories,
            sources_count: context.sources_count,
        })
    }
}

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub cache_ttl: Duration,
    pub streaming_delay: Duration,
    pub max_concurrent_streams: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            streaming_delay: Duration::from_millis(100),
            max_concurrent_streams: 10,
        }
    }
}

/// The orchestrator behind both HTTP question endpoints
pub struct RagOrchestrator {
    classifier: Arc<dyn Classifier>,
    generator: Arc<dyn Generator>,
    store: Arc<dyn ChatStore>,
    factory: Arc<dyn RetrieverFactory>,
    retrievers: TtlCache<String, Box<dyn Retriever>>,
    pipelines: TtlCache<(String, String), QaPipeline>,
    streaming_delay: Duration,
    stream_permits: Arc<Semaphore>,
}

impl RagOrchestrator {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        generator: Arc<dyn Generator>,
        store: Arc<dyn ChatStore>,
        factory: Arc<dyn RetrieverFactory>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier,
            generator,
            store,
            factory,
            retrievers: TtlCache::new(config.cache_ttl),
            pipelines: TtlCache::new(config.cache_ttl),
            streaming_delay: config.streaming_delay,
            stream_permits: Arc::new(Semaphore::new(config.max_concurrent_streams)),
        }
    }

    /// The conversation store behind the pipeline (for chat listing)
    pub fn chat_store(&self) -> Arc<dyn ChatStore> {
        Arc::clone(&self.store)
    }

    /// Drop cached resources for one user, e.g. after a document upload
    /// so new documents become visible immediately
    pub fn invalidate_user(&self, user_id: &str) {
        self.retrievers.invalidate(&user_id.to_string());
        self.pipelines.invalidate_if(|(user, _)| user == user_id);
    }

    async fn pipeline_for(&self, user_id: &str, chat_id: &str) -> Result<Arc<QaPipeline>> {
        let retriever = self
            .retrievers
            .get_or_try_build(user_id.to_string(), || self.factory.build(user_id))
            .await?;

        let classifier = Arc::clone(&self.classifier);
        let generator = Arc::clone(&self.generator);
        self.pipelines
            .get_or_try_build((user_id.to_string(), chat_id.to_string()), || async move {
                Ok(QaPipeline {
                    classifier,
                    retriever,
                    generator,
                })
            })
            .await
    }

    /// Synchronous question answering
    pub async fn answer(
        &self,
        question: &Question,
        user_id: &str,
        chat_id: &str,
        weeks: &WeekWindow,
    ) -> Result<Answer> {
        let pipeline = self.pipeline_for(user_id, chat_id).await?;
        pipeline.answer(question, weeks, user_id, chat_id).await
    }

    /// Streaming question answering. Returns immediately; events arrive
    /// on the receiver. A failed stage yields one error event and ends
    /// the stream. A dropped receiver stops production.
    pub fn answer_stream(
        self: &Arc<Self>,
        question: Question,
        user_id: String,
        chat_id: String,
        weeks: WeekWindow,
    ) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(32);
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let Ok(_permit) = Arc::clone(&this.stream_permits).acquire_owned().await else {
                return;
            };

            if let Err(e) = this
                .run_stream(&question, &user_id, &chat_id, &weeks, &tx)
                .await
            {
                tracing::error!(error = %e, user_id, chat_id, "stream failed");
                let _ = tx.send(StreamEvent::from_error(&e)).await;
            }
        });

        rx
    }

    async fn run_stream(
        &self,
        question: &Question,
        user_id: &str,
        chat_id: &str,
        weeks: &WeekWindow,
        tx: &mpsc::Sender<StreamEvent>,
    ) -> Result<()> {
        if tx
            .send(StreamEvent::status("Classifying question..."))
            .await
            .is_err()
        {
            return Ok(());
        }

        let pipeline = self.pipeline_for(user_id, chat_id).await?;
        let categories = pipeline.classifier.classify(question).await;

        if tx
            .send(StreamEvent::status("Searching your knowledge base..."))
            .await
            .is_err()
        {
            return Ok(());
        }

        let context = pipeline
            .retriever
            .retrieve(question, &categories, weeks)
            .await?;

        if tx
            .send(StreamEvent::status("Generating response..."))
            .await
            .is_err()
        {
            return Ok(());
        }

        let (token_tx, mut token_rx) = mpsc::channel::<String>(32);
        let generator = Arc::clone(&pipeline.generator);
        let handle = tokio::spawn({
            let question = question.clone();
            let context = context.clone();
            let user_id = user_id.to_string();
            let chat_id = chat_id.to_string();
            async move {
                generator
                    .generate_stream(&question, &context, &user_id, &chat_id, token_tx)
                    .await
            }
        });

        let mut total_chunks = 0usize;
        while let Some(content) = token_rx.recv().await {
            if tx.send(StreamEvent::Chunk { content }).await.is_err() {
                break;
            }
            total_chunks += 1;
            if !self.streaming_delay.is_zero() {
                tokio::time::sleep(self.streaming_delay).await;
            }
        }
        // Closing the token channel tells the generator to stop if the
        // consumer went away mid-stream.
        drop(token_rx);

        match handle.await {
            Ok(Ok(_full)) => {
                let _ = tx
                    .send(StreamEvent::Metadata {
                        classification: categories.labels(),
                        sources_used: context.sources_count,
                        total_chunks,
                    })
                    .await;
                Ok(())
            },
            Ok(Err(e)) => Err(e),
            Err(join) => Err(Error::Internal(join.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use weeklog_core::{Category, RetrievedContext};
    use weeklog_persistence::InMemoryChatStore;

    struct FixedClassifier;

    #[async_trait]
    impl Classifier for FixedClassifier {
        async fn classify(&self, _question: &Question) -> CategorySet {
            CategorySet::single(Category::Work)
        }
    }

    struct FakeRetriever {
        fail: bool,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn retrieve(
            &self,
            question: &Question,
            categories: &CategorySet,
            _weeks: &WeekWindow,
        ) -> Result<RetrievedContext> {
            if self.fail {
                return Err(Error::Retrieval("index offline".to_string()));
            }
            Ok(RetrievedContext {
                context: "[File Type: work]:\nstandup notes".to_string(),
                question: question.as_str().to_string(),
                categories: categories.clone(),
                sources_count: 2,
            })
        }
    }

    struct FakeGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate(
            &self,
            _question: &Question,
            _context: &RetrievedContext,
            _user_id: &str,
            _chat_id: &str,
        ) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            "Two meetings.".to_string()
        }

        async fn generate_stream(
            &self,
            _question: &Question,
            _context: &RetrievedContext,
            _user_id: &str,
            _chat_id: &str,
            tx: mpsc::Sender<String>,
        ) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for chunk in ["Two ", "meetings."] {
                let _ = tx.send(chunk.to_string()).await;
            }
            Ok("Two meetings.".to_string())
        }
    }

    struct FakeFactory {
        fail_retrieval: bool,
        builds: AtomicUsize,
    }

    #[async_trait]
    impl RetrieverFactory for FakeFactory {
        async fn build(&self, _user_id: &str) -> Result<Box<dyn Retriever>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeRetriever {
                fail: self.fail_retrieval,
            }))
        }
    }

    fn orchestrator(
        fail_retrieval: bool,
    ) -> (Arc<RagOrchestrator>, Arc<FakeGenerator>, Arc<FakeFactory>) {
        let generator = Arc::new(FakeGenerator {
            calls: AtomicUsize::new(0),
        });
        let factory = Arc::new(FakeFactory {
            fail_retrieval,
            builds: AtomicUsize::new(0),
        });
        let orchestrator = Arc::new(RagOrchestrator::new(
            Arc::new(FixedClassifier),
            Arc::clone(&generator) as Arc<dyn Generator>,
            Arc::new(InMemoryChatStore::new()),
            Arc::clone(&factory) as Arc<dyn RetrieverFactory>,
            OrchestratorConfig {
                streaming_delay: Duration::ZERO,
                ..Default::default()
            },
        ));
        (orchestrator, generator, factory)
    }

    fn question() -> Question {
        Question::new("what meetings did I have?").unwrap()
    }

    #[tokio::test]
    async fn test_answer_runs_all_stages() {
        let (orchestrator, generator, _) = orchestrator(false);

        let answer = orchestrator
            .answer(&question(), "u1", "c1", &WeekWindow::none())
            .await
            .unwrap();

        assert_eq!(answer.response, "Two meetings.");
        assert!(answer.categories.contains(Category::Work));
        assert_eq!(answer.sources_count, 2);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_generation() {
        let (orchestrator, generator, _) = orchestrator(true);

        let err = orchestrator
            .answer(&question(), "u1", "c1", &WeekWindow::none())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Retrieval(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retriever_built_once_per_user_within_ttl() {
        let (orchestrator, _, factory) = orchestrator(false);

        for chat in ["c1", "c2", "c1"] {
            orchestrator
                .answer(&question(), "u1", chat, &WeekWindow::none())
                .await
                .unwrap();
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_user_forces_rebuild() {
        let (orchestrator, _, factory) = orchestrator(false);

        orchestrator
            .answer(&question(), "u1", "c1", &WeekWindow::none())
            .await
            .unwrap();
        orchestrator.invalidate_user("u1");
        orchestrator
            .answer(&question(), "u1", "c1", &WeekWindow::none())
            .await
            .unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_event_order() {
        let (orchestrator, _, _) = orchestrator(false);

        let mut rx = orchestrator.answer_stream(
            question(),
            "u1".to_string(),
            "c1".to_string(),
            WeekWindow::none(),
        );

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events[0], StreamEvent::Status { .. }));
        let chunks: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Chunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(chunks, "Two meetings.");

        match events.last().unwrap() {
            StreamEvent::Metadata {
                classification,
                sources_used,
                total_chunks,
            } => {
                assert_eq!(classification, &vec!["work".to_string()]);
                assert_eq!(*sources_used, 2);
                assert_eq!(*total_chunks, 2);
            },
            other => panic!("expected metadata event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_retrieval_failure_ends_with_error_event() {
        let (orchestrator, generator, _) = orchestrator(true);

        let mut rx = orchestrator.answer_stream(
            question(),
            "u1".to_string(),
            "c1".to_string(),
            WeekWindow::none(),
        );

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        match events.last().unwrap() {
            StreamEvent::Error { error_type, .. } => {
                assert_eq!(error_type, "RetrievalError");
            },
            other => panic!("expected error event, got {:?}", other),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
