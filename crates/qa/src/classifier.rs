//! Question classification
//!
//! Maps a question onto the closed category set via one LLM call.
//! Classification never fails from the caller's perspective: transport
//! faults and unparseable output both resolve to the fallback set.

use std::sync::Arc;

use async_trait::async_trait;

use weeklog_core::{CategorySet, Classifier, Question};
use weeklog_llm::{LlmBackend, Message};

/// LLM-backed classifier
pub struct QuestionClassifier {
    backend: Arc<dyn LlmBackend>,
    prompt: String,
    temperature: f32,
}

impl QuestionClassifier {
    pub fn new(backend: Arc<dyn LlmBackend>, prompt: String, temperature: f32) -> Self {
        Self {
            backend,
            prompt,
            temperature,
        }
    }
}

#[async_trait]
impl Classifier for QuestionClassifier {
    async fn classify(&self, question: &Question) -> CategorySet {
        let messages = [
            Message::system(self.prompt.clone()),
            Message::user(format!(
                "Please help me classify this question: {}",
                question.as_str()
            )),
        ];

        match self.backend.generate(&messages, self.temperature).await {
            Ok(result) => {
                let categories = parse_labels(&result.text);
                tracing::debug!(%categories, raw = %result.text, "classified question");
                categories
            },
            Err(e) => {
                tracing::warn!(error = %e, "classification failed, using fallback");
                CategorySet::fallback()
            },
        }
    }
}

/// Parse model output into categories.
///
/// Primary path is a JSON array of names; anything else falls back to a
/// bracket-stripped comma split. Unknown labels are dropped and an
/// empty result normalizes to `{personal}`.
fn parse_labels(raw: &str) -> CategorySet {
    let trimmed = raw.trim();

    if let Ok(labels) = serde_json::from_str::<Vec<String>>(trimmed) {
        return CategorySet::from_labels(labels);
    }

    let bare = trimmed.trim_matches(|c| c == '[' || c == ']');
    CategorySet::from_labels(bare.split(','))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use weeklog_core::Category;
    use weeklog_llm::{FinishReason, GenerationResult, LlmError};

    struct CannedBackend {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(
            &self,
            _messages: &[Message],
            _temperature: f32,
        ) -> Result<GenerationResult, LlmError> {
            match &self.reply {
                Ok(text) => Ok(GenerationResult {
                    text: text.clone(),
                    tokens: 1,
                    total_time_ms: 1,
                    finish_reason: FinishReason::Stop,
                }),
                Err(()) => Err(LlmError::Network("down".to_string())),
            }
        }

        async fn generate_stream(
            &self,
            _messages: &[Message],
            _temperature: f32,
            _tx: mpsc::Sender<String>,
        ) -> Result<GenerationResult, LlmError> {
            unimplemented!("not used by classifier")
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    fn classifier(reply: Result<&str, ()>) -> QuestionClassifier {
        QuestionClassifier::new(
            Arc::new(CannedBackend {
                reply: reply.map(str::to_string),
            }),
            "classify".to_string(),
            0.0,
        )
    }

    fn question() -> Question {
        Question::new("what meetings did I have?").unwrap()
    }

    #[tokio::test]
    async fn test_json_array_reply() {
        let set = classifier(Ok(r#"["work", "health"]"#))
            .classify(&question())
            .await;
        assert_eq!(set.as_slice(), &[Category::Work, Category::Health]);
    }

    #[tokio::test]
    async fn test_bare_label_reply() {
        let set = classifier(Ok("work")).classify(&question()).await;
        assert_eq!(set.as_slice(), &[Category::Work]);
    }

    #[tokio::test]
    async fn test_sloppy_bracketed_reply() {
        let set = classifier(Ok("['work', 'reflection']"))
            .classify(&question())
            .await;
        assert_eq!(set.as_slice(), &[Category::Work, Category::Reflection]);
    }

    #[tokio::test]
    async fn test_garbage_reply_falls_back() {
        let set = classifier(Ok("I think this is about finances"))
            .classify(&question())
            .await;
        assert_eq!(set.as_slice(), &[Category::Personal]);
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let set = classifier(Err(())).classify(&question()).await;
        assert_eq!(set.as_slice(), &[Category::Personal]);
    }
}
