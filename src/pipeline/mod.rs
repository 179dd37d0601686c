//! Retrieval-and-grounding pipeline.
//!
//! One request runs four stages strictly in sequence:
//! embed → retrieve → assemble → answer. Each stage is raced against the
//! request's cancellation token and deadline; there are no retries and no
//! partial results.
pub mod answerer;
pub mod assembler;
pub mod retriever;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::RagError;
use crate::models::{Answer, Query};
use crate::openai::ChatModel;
use crate::storage::ObjectStore;
use answerer::{Answerer, MAX_OUTPUT_TOKENS};
use assembler::ContextAssembler;
use retriever::{RetrievalPolicy, Retriever, VectorIndex};

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retrieval: RetrievalPolicy,
    pub max_output_tokens: u32,
    pub max_images_to_model: usize,
    pub request_timeout: Duration,
    pub reject_blank_message: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            retrieval: RetrievalPolicy::default(),
            max_output_tokens: MAX_OUTPUT_TOKENS,
            max_images_to_model: 1,
            request_timeout: Duration::from_secs(120),
            reject_blank_message: false,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            retrieval: RetrievalPolicy {
                top_k: config.index.top_k,
                min_similarity: config.index.min_similarity,
            },
            max_output_tokens: config.openai.max_output_tokens,
            max_images_to_model: config.pipeline.max_images_to_model,
            request_timeout: Duration::from_secs(config.pipeline.request_timeout_secs),
            reject_blank_message: config.pipeline.reject_blank_message,
        }
    }
}

pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    assembler: ContextAssembler,
    answerer: Answerer,
    request_timeout: Duration,
    reject_blank_message: bool,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn ObjectStore>,
        model: Arc<dyn ChatModel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            retriever: Retriever::new(index, settings.retrieval),
            assembler: ContextAssembler::new(store),
            answerer: Answerer::new(model, settings.max_output_tokens, settings.max_images_to_model),
            request_timeout: settings.request_timeout,
            reject_blank_message: settings.reject_blank_message,
        }
    }

    /// Answer `query` from retrieved evidence.
    ///
    /// Zero retrieved records is not an error: the model is still asked,
    /// with an instruction-only system prompt.
    pub async fn handle(&self, query: &Query, cancel: &CancellationToken) -> Result<Answer, RagError> {
        if self.reject_blank_message && query.message.trim().is_empty() {
            return Err(RagError::invalid_input("message is blank"));
        }

        // A timeout too large to represent means no deadline
        let deadline = Instant::now().checked_add(self.request_timeout);

        let started = Instant::now();
        let vector = guarded(cancel, deadline, self.embedder.embed(&query.message))
            .await?
            .map_err(RagError::EmbeddingFailed)?;
        debug!("embedded query into {} dims in {:?}", vector.len(), started.elapsed());

        let started = Instant::now();
        let records = guarded(cancel, deadline, self.retriever.retrieve(&vector))
            .await?
            .map_err(RagError::RetrievalFailed)?;
        debug!("retrieved {} records in {:?}", records.len(), started.elapsed());

        let started = Instant::now();
        let context = guarded(cancel, deadline, self.assembler.assemble(&records)).await??;
        debug!(
            "assembled {} prompt bytes and {} images in {:?}",
            context.system_prompt.len(),
            context.images.len(),
            started.elapsed()
        );

        let started = Instant::now();
        let answer = guarded(
            cancel,
            deadline,
            self.answerer
                .answer(&context.system_prompt, &query.message, &context.images),
        )
        .await?
        .map_err(RagError::CompletionFailed)?;
        debug!("answered in {:?}", started.elapsed());

        Ok(answer)
    }
}

/// Run `fut` unless the request is cancelled or its deadline passes first.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output, RagError> {
    let bounded = async move {
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| RagError::DeadlineExceeded),
            None => Ok(fut.await),
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RagError::Cancelled),
        res = bounded => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use crate::models::RetrievedRecord;
    use crate::openai::{ChatMessage, Choice, MessageContent, ModelError};
    use crate::pipeline::assembler::GROUNDING_INSTRUCTION;
    use crate::pipeline::retriever::IndexError;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticIndex {
        records: Vec<RetrievedRecord>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl VectorIndex for StaticIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _min_similarity: f64,
        ) -> Result<Vec<RetrievedRecord>, IndexError> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail {
                return Err(IndexError::query("index unavailable"));
            }
            Ok(self.records.clone())
        }
    }

    struct EchoStore;

    #[async_trait]
    impl ObjectStore for EchoStore {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
            Ok(path.as_bytes().to_vec())
        }
    }

    struct ScriptedModel {
        reply: Vec<Choice>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(reply: Vec<Choice>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _max_output_tokens: u32,
        ) -> Result<Vec<Choice>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn rec(name: &str, content: &str, image: Option<&str>) -> RetrievedRecord {
        RetrievedRecord {
            file_name: name.to_string(),
            content: content.to_string(),
            contains_image: image.is_some(),
            image_blob_path: image.map(str::to_string),
            similarity_score: 0.8,
        }
    }

    fn pipeline(index: StaticIndex, model: Arc<ScriptedModel>, settings: PipelineSettings) -> RagPipeline {
        RagPipeline::new(
            Arc::new(MockEmbedder::new(4)),
            Arc::new(index),
            Arc::new(EchoStore),
            model,
            settings,
        )
    }

    fn index_of(records: Vec<RetrievedRecord>) -> StaticIndex {
        StaticIndex {
            records,
            fail: false,
            delay: None,
        }
    }

    #[tokio::test]
    async fn test_round_trip_answer() {
        let model = ScriptedModel::new(vec![Choice::with_content("world")]);
        let p = pipeline(
            index_of(vec![rec("a.txt", "hello", None)]),
            model.clone(),
            PipelineSettings::default(),
        );

        let answer = p.handle(&Query::new("hi"), &CancellationToken::new()).await.unwrap();
        assert_eq!(answer.text, "world");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(
            seen[0][0].content,
            MessageContent::Text(format!("{GROUNDING_INSTRUCTION}File: a.txt\nContent: hello\n\n"))
        );
        assert_eq!(seen[0][1], ChatMessage::user("hi"));
    }

    #[tokio::test]
    async fn test_empty_retrieval_still_answers() {
        let model = ScriptedModel::new(vec![Choice::with_content("分かりません")]);
        let p = pipeline(index_of(vec![]), model.clone(), PipelineSettings::default());

        let answer = p.handle(&Query::new("unknown"), &CancellationToken::new()).await.unwrap();
        assert_eq!(answer.text, "分かりません");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            model.seen.lock().unwrap()[0][0].content,
            MessageContent::Text(GROUNDING_INSTRUCTION.to_string())
        );
    }

    #[tokio::test]
    async fn test_only_first_image_reaches_model() {
        let model = ScriptedModel::new(vec![Choice::with_content("ok")]);
        let p = pipeline(
            index_of(vec![
                rec("a.pdf", "A", Some("first.png")),
                rec("b.pdf", "B", Some("second.png")),
            ]),
            model.clone(),
            PipelineSettings::default(),
        );

        p.handle(&Query::new("show me"), &CancellationToken::new()).await.unwrap();

        let seen = model.seen.lock().unwrap();
        let body = serde_json::to_string(&seen[0]).unwrap();
        assert_eq!(seen[0].len(), 3);
        // EchoStore returns the path bytes, so the payloads are base64 of the paths
        assert!(body.contains("Zmlyc3QucG5n"));
        assert!(!body.contains("c2Vjb25kLnBuZw=="));
    }

    #[tokio::test]
    async fn test_fallback_on_absent_content() {
        let model = ScriptedModel::new(vec![Choice::default()]);
        let p = pipeline(index_of(vec![]), model, PipelineSettings::default());
        let answer = p.handle(&Query::new("hi"), &CancellationToken::new()).await.unwrap();
        assert_eq!(answer.text, answerer::FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_model() {
        let model = ScriptedModel::new(vec![Choice::with_content("never")]);
        let p = pipeline(
            StaticIndex {
                records: vec![],
                fail: true,
                delay: None,
            },
            model.clone(),
            PipelineSettings::default(),
        );

        let err = p.handle(&Query::new("hi"), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), "retrieval_failed");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_message_passes_through_by_default() {
        let model = ScriptedModel::new(vec![Choice::with_content("ok")]);
        let p = pipeline(index_of(vec![]), model.clone(), PipelineSettings::default());
        assert!(p.handle(&Query::new("   "), &CancellationToken::new()).await.is_ok());
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_message_rejected_when_configured() {
        let model = ScriptedModel::new(vec![Choice::with_content("ok")]);
        let settings = PipelineSettings {
            reject_blank_message: true,
            ..PipelineSettings::default()
        };
        let p = pipeline(index_of(vec![]), model.clone(), settings);
        let err = p.handle(&Query::new(" \n"), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let model = ScriptedModel::new(vec![Choice::with_content("ok")]);
        let p = pipeline(index_of(vec![]), model.clone(), PipelineSettings::default());
        let token = CancellationToken::new();
        token.cancel();
        let err = p.handle(&Query::new("hi"), &token).await.unwrap_err();
        assert!(matches!(err, RagError::Cancelled));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let model = ScriptedModel::new(vec![Choice::with_content("ok")]);
        let settings = PipelineSettings {
            request_timeout: Duration::from_millis(50),
            ..PipelineSettings::default()
        };
        let p = pipeline(
            StaticIndex {
                records: vec![],
                fail: false,
                delay: Some(Duration::from_secs(2)),
            },
            model.clone(),
            settings,
        );
        let err = p.handle(&Query::new("hi"), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RagError::DeadlineExceeded));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_runs_without_deadline() {
        let model = ScriptedModel::new(vec![Choice::with_content("world")]);
        let settings = PipelineSettings {
            request_timeout: Duration::from_secs(u64::MAX),
            ..PipelineSettings::default()
        };
        let p = pipeline(index_of(vec![rec("a.txt", "hello", None)]), model.clone(), settings);

        let answer = p.handle(&Query::new("hi"), &CancellationToken::new()).await.unwrap();
        assert_eq!(answer.text, "world");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }
}
