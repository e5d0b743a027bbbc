//! Answer generation with conversation memory
//!
//! History flows one way: the last ten exchanges are read into the
//! prompt, and the new exchange is appended only after generation
//! succeeds. A failed generation leaves history untouched.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use weeklog_core::{
    ChatStore, Error, Exchange, Generator, Question, Result, RetrievedContext,
};
use weeklog_llm::{FinishReason, LlmBackend, Message, PromptTemplate};

/// Fixed reply when the completion service fails mid-request
pub const GENERATION_APOLOGY: &str =
    "I'm sorry, something went wrong while generating the response.";

/// LLM-backed generator with chat-store-backed memory
pub struct ResponseGenerator {
    backend: Arc<dyn LlmBackend>,
    store: Arc<dyn ChatStore>,
    prompt: PromptTemplate,
    temperature: f32,
}

impl ResponseGenerator {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        store: Arc<dyn ChatStore>,
        prompt: PromptTemplate,
        temperature: f32,
    ) -> Self {
        Self {
            backend,
            store,
            prompt,
            temperature,
        }
    }

    fn user_turn(question: &Question) -> Message {
        Message::user(format!(
            "Please help me with this question: {}",
            question.as_str()
        ))
    }

    async fn build_messages(
        &self,
        question: &Question,
        context: &RetrievedContext,
        user_id: &str,
        chat_id: &str,
    ) -> Result<Vec<Message>> {
        let session = self.store.get_or_create(user_id, chat_id).await?;
        let history = session.format_history();

        let system = self.prompt.render(&[
            ("context", context.context.as_str()),
            ("chat_history", history.as_str()),
        ]);

        Ok(vec![Message::system(system), Self::user_turn(question)])
    }

    async fn append_exchange(
        &self,
        user_id: &str,
        chat_id: &str,
        question: &Question,
        answer: &str,
    ) {
        let exchange = Exchange::new(question.as_str(), answer);
        if let Err(e) = self.store.append(user_id, chat_id, vec![exchange]).await {
            tracing::warn!(error = %e, user_id, chat_id, "failed to append exchange to history");
        }
    }
}

#[async_trait]
impl Generator for ResponseGenerator {
    async fn generate(
        &self,
        question: &Question,
        context: &RetrievedContext,
        user_id: &str,
        chat_id: &str,
    ) -> String {
        let messages = match self
            .build_messages(question, context, user_id, chat_id)
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history, answering without it");
                let system = self.prompt.render(&[
                    ("context", context.context.as_str()),
                    ("chat_history", ""),
                ]);
                vec![Message::system(system), Self::user_turn(question)]
            },
        };

        match self.backend.generate(&messages, self.temperature).await {
            Ok(result) => {
                self.append_exchange(user_id, chat_id, question, &result.text)
                    .await;
                result.text
            },
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                GENERATION_APOLOGY.to_string()
            },
        }
    }

    async fn generate_stream(
        &self,
        question: &Question,
        context: &RetrievedContext,
        user_id: &str,
        chat_id: &str,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        let messages = self
            .build_messages(question, context, user_id, chat_id)
            .await?;

        let result = self
            .backend
            .generate_stream(&messages, self.temperature, tx)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;

        // Append only at stream completion. An aborted stream persists
        // nothing, even when the client saw a prefix of the text.
        if result.finish_reason != FinishReason::Cancelled {
            self.append_exchange(user_id, chat_id, question, &result.text)
                .await;
        }

        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weeklog_core::CategorySet;
    use weeklog_llm::{GenerationResult, LlmError};
    use weeklog_persistence::InMemoryChatStore;

    struct CannedBackend {
        reply: std::result::Result<String, ()>,
        stream_chunks: Vec<String>,
        cancel: bool,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _temperature: f32,
        ) -> std::result::Result<GenerationResult, LlmError> {
            match &self.reply {
                Ok(text) => Ok(GenerationResult {
                    text: text.clone(),
                    tokens: 1,
                    total_time_ms: 1,
                    finish_reason: FinishReason::Stop,
                }),
                Err(()) => Err(LlmError::Api("bad request".to_string())),
            }
        }

        async fn generate_stream(
            &self,
            _messages: &[Message],
            _temperature: f32,
            tx: mpsc::Sender<String>,
        ) -> std::result::Result<GenerationResult, LlmError> {
            if self.reply.is_err() {
                return Err(LlmError::Network("dropped".to_string()));
            }
            let mut full = String::new();
            for chunk in &self.stream_chunks {
                full.push_str(chunk);
                let _ = tx.send(chunk.clone()).await;
            }
            Ok(GenerationResult {
                text: full,
                tokens: self.stream_chunks.len(),
                total_time_ms: 1,
                finish_reason: if self.cancel {
                    FinishReason::Cancelled
                } else {
                    FinishReason::Stop
                },
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn generator(
        reply: std::result::Result<&str, ()>,
        chunks: &[&str],
        cancel: bool,
        store: Arc<InMemoryChatStore>,
    ) -> ResponseGenerator {
        ResponseGenerator::new(
            Arc::new(CannedBackend {
                reply: reply.map(str::to_string),
                stream_chunks: chunks.iter().map(|c| c.to_string()).collect(),
                cancel,
            }),
            store,
            PromptTemplate::new("Context:\n{context}\n\nHistory:\n{chat_history}"),
            0.1,
        )
    }

    fn context() -> RetrievedContext {
        RetrievedContext {
            context: "[File Type: work]:\nstandup notes".to_string(),
            question: "what meetings did I have?".to_string(),
            categories: CategorySet::default(),
            sources_count: 1,
        }
    }

    fn question() -> Question {
        Question::new("what meetings did I have?").unwrap()
    }

    #[tokio::test]
    async fn test_success_appends_exchange() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Ok("You had two meetings."), &[], false, Arc::clone(&store));

        let answer = gen.generate(&question(), &context(), "u1", "c1").await;
        assert_eq!(answer, "You had two meetings.");

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert_eq!(session.exchanges.len(), 1);
        assert_eq!(session.exchanges[0].assistant_response, answer);
    }

    #[tokio::test]
    async fn test_failure_returns_apology_and_appends_nothing() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Err(()), &[], false, Arc::clone(&store));

        let answer = gen.generate(&question(), &context(), "u1", "c1").await;
        assert_eq!(answer, GENERATION_APOLOGY);

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert!(session.exchanges.is_empty());
    }

    #[tokio::test]
    async fn test_successive_generations_append_in_order() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Ok("Noted."), &[], false, Arc::clone(&store));

        let first = Question::new("what meetings did I have?").unwrap();
        let second = Question::new("what did I eat on monday?").unwrap();
        gen.generate(&first, &context(), "u1", "c1").await;
        gen.generate(&second, &context(), "u1", "c1").await;

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert_eq!(session.exchanges.len(), 2);
        assert_eq!(session.exchanges[0].user_input, first.as_str());
        assert_eq!(session.exchanges[1].user_input, second.as_str());
    }

    #[tokio::test]
    async fn test_stream_appends_once_on_completion() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Ok(""), &["You ", "had ", "two."], false, Arc::clone(&store));

        let (tx, mut rx) = mpsc::channel(16);
        let full = gen
            .generate_stream(&question(), &context(), "u1", "c1", tx)
            .await
            .unwrap();
        assert_eq!(full, "You had two.");

        let mut streamed = String::new();
        while let Ok(chunk) = rx.try_recv() {
            streamed.push_str(&chunk);
        }
        assert_eq!(streamed, full);

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert_eq!(session.exchanges.len(), 1);
        assert_eq!(session.exchanges[0].assistant_response, "You had two.");
    }

    #[tokio::test]
    async fn test_cancelled_stream_appends_nothing() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Ok(""), &["partial ", "ans"], true, Arc::clone(&store));

        let (tx, _rx) = mpsc::channel(16);
        let full = gen
            .generate_stream(&question(), &context(), "u1", "c1", tx)
            .await
            .unwrap();
        assert_eq!(full, "partial ans");

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert!(session.exchanges.is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_appends_nothing() {
        let store = Arc::new(InMemoryChatStore::new());
        let gen = generator(Err(()), &[], false, Arc::clone(&store));

        let (tx, _rx) = mpsc::channel(16);
        let err = gen
            .generate_stream(&question(), &context(), "u1", "c1", tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));

        let session = store.get("u1", "c1").await.unwrap().unwrap();
        assert!(session.exchanges.is_empty());
    }
}
