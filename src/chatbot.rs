use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::cache::{CacheEntry, make_cache_key};
use crate::config::{APIFY_TOKEN_VARS, OPENAI_KEY_VARS, Settings, resolve_env};
use crate::crawler::{ApifyClient, DocumentSource};
use crate::embeddings::{Embedder, OpenAiEmbedder};
use crate::errors::{AskError, StartupError};
use crate::index::VectorIndex;
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, INDEX_CHUNKS, QUERY_FAILURES_TOTAL, QUERY_LATENCY, QUESTIONS_TOTAL,
    RATE_LIMITED_TOTAL, VALIDATION_REJECTED_TOTAL,
};
use crate::query::{CompletionModel, OpenAiChatModel, QueryEngine};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::validate::Validator;

pub const FAREWELL: &str = "Goodbye!";

const INSTRUCTION_PROMPT: &str = "You are an assistant tasked with answering questions based on the information available. \
Please provide the most accurate and concise answer you can. If the answer cannot be found in the provided data, \
kindly inform the user that the information is not available. \
Always ensure your response is clear and easy to understand.";

const FORMAT_STYLE: &str = "Please answer in a short, conversational tone. Your response should be clear, direct, and concise, \
as if you're explaining it to a friend. Avoid excessive jargon, and if the information is not available, \
politely inform the user of the limitations.";

// Everything tunable about the per-question pipeline
#[derive(Debug, Clone)]
pub struct ChatbotOptions {
    pub rate_limit: RateLimitConfig,
    pub max_question_length: usize,
    pub banned_chars: String,
    pub cache_ttl: Duration,
    pub top_k: usize,
    pub embedding_model: String,
    pub chat_model: String,
}

impl Default for ChatbotOptions {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            max_question_length: crate::validate::DEFAULT_MAX_LENGTH,
            banned_chars: crate::validate::DEFAULT_BANNED_CHARS.to_string(),
            cache_ttl: Duration::from_secs(300),
            top_k: 4,
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
        }
    }
}

// Facade over the whole pipeline: owns the index lifecycle and runs
// exit-check -> rate limit -> validate -> cache -> query per question.
pub struct Chatbot {
    engine: QueryEngine,
    limiter: RateLimiter,
    validator: Validator,
    cache: DashMap<String, CacheEntry>,
    cache_ttl: Duration,
}

impl Chatbot {
    // Production construction: resolve credentials, then build or load
    // depending on whether the persist directory exists. The crawl token
    // is only required when there is no persisted index.
    pub async fn build(
        opts: &ChatbotOptions,
        config_path: &Path,
        persist_dir: &Path,
    ) -> Result<Self, StartupError> {
        let settings = Settings::load(config_path)?;
        let llm_key = resolve_env(OPENAI_KEY_VARS)?;
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
            llm_key.clone(),
            &opts.embedding_model,
        ));
        let model: Arc<dyn CompletionModel> =
            Arc::new(OpenAiChatModel::new(llm_key, &opts.chat_model));

        if persist_dir.exists() {
            return Self::load_persisted(persist_dir, embedder, model, opts);
        }

        let crawl_token = resolve_env(APIFY_TOKEN_VARS)?;
        let source = ApifyClient::new(crawl_token);
        Self::crawl_and_build(&settings.websites, &source, embedder, model, opts, persist_dir).await
    }

    // Same lifecycle decision, but with caller-supplied collaborators.
    // This is the seam the tests drive.
    pub async fn from_collaborators(
        websites: &[String],
        source: &dyn DocumentSource,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        opts: &ChatbotOptions,
        persist_dir: &Path,
    ) -> Result<Self, StartupError> {
        if persist_dir.exists() {
            Self::load_persisted(persist_dir, embedder, model, opts)
        } else {
            Self::crawl_and_build(websites, source, embedder, model, opts, persist_dir).await
        }
    }

    fn load_persisted(
        persist_dir: &Path,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        opts: &ChatbotOptions,
    ) -> Result<Self, StartupError> {
        let index = VectorIndex::load(persist_dir).map_err(StartupError::LoadIndex)?;
        tracing::info!(
            "loaded persisted index from {} ({} chunks, model {})",
            persist_dir.display(),
            index.len(),
            index.embedding_model
        );
        Ok(Self::assemble(index, embedder, model, opts))
    }

    async fn crawl_and_build(
        websites: &[String],
        source: &dyn DocumentSource,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        opts: &ChatbotOptions,
        persist_dir: &Path,
    ) -> Result<Self, StartupError> {
        let documents = source.fetch(websites).await.map_err(StartupError::Crawl)?;
        let index = VectorIndex::build(&documents, embedder.as_ref(), &opts.embedding_model)
            .await
            .map_err(StartupError::BuildIndex)?;
        index.persist(persist_dir).map_err(StartupError::PersistIndex)?;
        tracing::info!(
            "built index from {} documents ({} chunks), persisted to {}",
            documents.len(),
            index.len(),
            persist_dir.display()
        );
        Ok(Self::assemble(index, embedder, model, opts))
    }

    fn assemble(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        opts: &ChatbotOptions,
    ) -> Self {
        INDEX_CHUNKS.set(index.len() as f64);
        Self {
            engine: QueryEngine::new(index, embedder, model, opts.top_k),
            limiter: RateLimiter::new(opts.rate_limit),
            validator: Validator::new(opts.max_question_length, &opts.banned_chars),
            cache: DashMap::new(),
            cache_ttl: opts.cache_ttl,
        }
    }

    pub async fn ask(&self, caller: &str, question: &str) -> Result<String, AskError> {
        // "exit" short-circuits everything and consumes no rate-limit slot
        if question.trim().eq_ignore_ascii_case("exit") {
            return Ok(FAREWELL.to_string());
        }

        QUESTIONS_TOTAL.inc();

        if let Err(err) = self.limiter.check(caller) {
            RATE_LIMITED_TOTAL.inc();
            tracing::warn!("rate limit rejection for caller {caller}: {err}");
            return Err(err);
        }

        let sanitized = match self.validator.sanitize(question) {
            Ok(question) => question,
            Err(err) => {
                VALIDATION_REJECTED_TOTAL.inc();
                tracing::warn!("validation rejection: {err}");
                return Err(err.into());
            }
        };

        let cache_key = make_cache_key(&sanitized);
        if let Some(entry) = self.cache.get(&cache_key) {
            if entry.created_at.elapsed() < self.cache_ttl {
                CACHE_HITS.inc();
                tracing::info!("answered from cache");
                return Ok(entry.answer.clone());
            }
        }
        CACHE_MISSES.inc();

        let full_prompt =
            format!("{INSTRUCTION_PROMPT}\n\nQuestion: {sanitized}\n\nFormat: {FORMAT_STYLE}");

        let start_time = Instant::now();
        match self.engine.query(&full_prompt).await {
            Ok(answer) => {
                QUERY_LATENCY.observe(start_time.elapsed().as_secs_f64());
                self.cache.insert(
                    cache_key,
                    CacheEntry {
                        answer: answer.clone(),
                        created_at: Instant::now(),
                    },
                );
                tracing::info!("query answered in {:?}", start_time.elapsed());
                Ok(answer)
            }
            Err(err) => {
                QUERY_FAILURES_TOTAL.inc();
                tracing::error!("query failed: {err}");
                Err(AskError::Downstream(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::crawler::Document;
    use crate::errors::{ApiError, ValidationError};

    // Counts fetches and remembers the start urls it was handed
    #[derive(Default)]
    struct StubSource {
        calls: AtomicUsize,
        last_urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentSource for StubSource {
        async fn fetch(&self, start_urls: &[String]) -> Result<Vec<Document>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_urls.lock().expect("lock") = start_urls.to_vec();
            Ok(vec![
                Document {
                    text: "The admissions office is open on weekdays.".to_string(),
                    url: "https://a.example".to_string(),
                },
                Document {
                    text: "Tuition information is published every spring.".to_string(),
                    url: "https://b.example".to_string(),
                },
            ])
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            // Deterministic two-dimensional vectors keyed off text length
            Ok(inputs
                .iter()
                .map(|text| vec![text.len() as f32, 1.0])
                .collect())
        }
    }

    #[derive(Default)]
    struct StubModel {
        calls: AtomicUsize,
        last_user_prompt: Mutex<String>,
    }

    #[async_trait]
    impl CompletionModel for StubModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user_prompt.lock().expect("lock") = user.to_string();
            Ok("a helpful answer".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl CompletionModel for FailingModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ApiError> {
            Err(ApiError::MalformedResponse("boom".to_string()))
        }
    }

    fn websites() -> Vec<String> {
        vec![
            "https://a.example".to_string(),
            "https://b.example".to_string(),
            "https://c.example".to_string(),
        ]
    }

    async fn chatbot_with(
        source: &StubSource,
        model: Arc<dyn CompletionModel>,
        opts: &ChatbotOptions,
        persist_dir: &Path,
    ) -> Chatbot {
        Chatbot::from_collaborators(
            &websites(),
            source,
            Arc::new(StubEmbedder),
            model,
            opts,
            persist_dir,
        )
        .await
        .expect("construction")
    }

    #[tokio::test]
    async fn first_construction_crawls_second_loads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let persist_dir = dir.path().join("storage_index");
        let source = StubSource::default();
        let opts = ChatbotOptions::default();

        let bot = chatbot_with(&source, Arc::new(StubModel::default()), &opts, &persist_dir).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.last_urls.lock().expect("lock").len(), 3);
        assert!(persist_dir.exists());
        assert!(!bot.engine.index().is_empty());

        // Second construction finds the persisted index and never crawls
        let reloaded =
            chatbot_with(&source, Arc::new(StubModel::default()), &opts, &persist_dir).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reloaded.engine.index().len(), bot.engine.index().len());
    }

    #[tokio::test]
    async fn exit_never_consumes_a_rate_limit_slot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let opts = ChatbotOptions {
            rate_limit: RateLimitConfig {
                max_requests: 2,
                ..RateLimitConfig::default()
            },
            ..ChatbotOptions::default()
        };
        let bot = chatbot_with(
            &source,
            Arc::new(StubModel::default()),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        for variant in ["exit", "EXIT", "Exit", "  exit  "] {
            for _ in 0..5 {
                assert_eq!(bot.ask("local", variant).await.expect("farewell"), FAREWELL);
            }
        }

        // Both window slots are still free
        assert!(bot.ask("local", "one").await.is_ok());
        assert!(bot.ask("local", "two").await.is_ok());
        assert!(matches!(
            bot.ask("local", "three").await,
            Err(AskError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn rate_limit_rejection_is_reported_with_wait_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let opts = ChatbotOptions {
            rate_limit: RateLimitConfig {
                max_requests: 1,
                cooldown: Duration::from_secs(30),
                ..RateLimitConfig::default()
            },
            ..ChatbotOptions::default()
        };
        let bot = chatbot_with(
            &source,
            Arc::new(StubModel::default()),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        assert!(bot.ask("local", "first").await.is_ok());
        match bot.ask("local", "second").await {
            Err(AskError::RateLimited { retry_after_secs }) => {
                assert_eq!(retry_after_secs, 30);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_engine_runs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let model = Arc::new(StubModel::default());
        let opts = ChatbotOptions::default();
        let bot = chatbot_with(
            &source,
            model.clone(),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        let result = bot.ask("local", "drop <table>").await;
        assert!(matches!(
            result,
            Err(AskError::Invalid(ValidationError::InvalidCharacters { found: '<' }))
        ));
        let result = bot.ask("local", &"x".repeat(501)).await;
        assert!(matches!(
            result,
            Err(AskError::Invalid(ValidationError::TooLong { .. }))
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn question_is_trimmed_into_the_prompt_template() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let model = Arc::new(StubModel::default());
        let opts = ChatbotOptions::default();
        let bot = chatbot_with(
            &source,
            model.clone(),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        bot.ask("local", "  when is the office open  ")
            .await
            .expect("answer");
        let prompt = model.last_user_prompt.lock().expect("lock").clone();
        assert!(prompt.contains("Question: when is the office open\n"));
        assert!(prompt.starts_with(INSTRUCTION_PROMPT));
        assert!(prompt.ends_with(FORMAT_STYLE));
    }

    #[tokio::test]
    async fn repeated_question_is_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let model = Arc::new(StubModel::default());
        let opts = ChatbotOptions::default();
        let bot = chatbot_with(
            &source,
            model.clone(),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        let first = bot.ask("local", "when is the office open").await.expect("answer");
        let second = bot.ask("local", "when is the office open").await.expect("answer");
        assert_eq!(first, second);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn engine_failure_is_absorbed_into_a_downstream_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = StubSource::default();
        let opts = ChatbotOptions::default();
        let bot = chatbot_with(
            &source,
            Arc::new(FailingModel),
            &opts,
            &dir.path().join("storage_index"),
        )
        .await;

        let result = bot.ask("local", "anything").await;
        assert!(matches!(result, Err(AskError::Downstream(_))));

        // The pipeline is still alive for the next question
        let result = bot.ask("local", "anything else").await;
        assert!(matches!(result, Err(AskError::Downstream(_))));
    }
}
