use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::errors::ApiError;
use crate::index::VectorIndex;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// Chat completion backend, stubbed out in tests
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ApiError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

// OpenAI chat completions client
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ApiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = res.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ApiError::MalformedResponse("response carried no choices".to_string()))
    }
}

// Wraps the index and the completion model: embed the prompt, pull the
// closest passages, answer with them as context.
pub struct QueryEngine {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn CompletionModel>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn CompletionModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            model,
            top_k,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub async fn query(&self, prompt: &str) -> Result<String, ApiError> {
        let embeddings = self.embedder.embed(&[prompt.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::MalformedResponse("embedding response was empty".to_string()))?;

        let passages = self.index.top_k(&query_embedding, self.top_k);
        let context = passages
            .iter()
            .map(|entry| format!("[source: {}]\n{}", entry.url, entry.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = format!(
            "Use the following context from the indexed websites to answer the question.\n\n{context}"
        );
        self.model.complete(&system, prompt).await
    }
}
