use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

// Turns a batch of texts into vectors, one per input, same order
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

// OpenAI embeddings API client
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
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
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let res = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: inputs,
            })
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

        let mut response: EmbeddingResponse = res.json().await?;
        if response.data.len() != inputs.len() {
            return Err(ApiError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                response.data.len()
            )));
        }

        // The API does not promise ordering, the index field does
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
