use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crawler::Document;
use crate::embeddings::Embedder;
use crate::errors::{ApiError, IndexError};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;
const INDEX_FILE: &str = "index.json";
const EMBED_BATCH: usize = 64;

// One embedded chunk of a crawled page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub url: String,
    pub embedding: Vec<f32>,
}

// Persisted vector index. The directory it lives in is the sole
// build-vs-load signal at startup.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    pub embedding_model: String,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    // Chunk, embed and collect every document into a fresh index
    pub async fn build(
        documents: &[Document],
        embedder: &dyn Embedder,
        embedding_model: &str,
    ) -> Result<Self, ApiError> {
        let mut chunks: Vec<(String, String)> = Vec::new();
        for doc in documents {
            for chunk in split_into_chunks(&doc.text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP) {
                chunks.push((chunk, doc.url.clone()));
            }
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(text, _)| text.clone()).collect();
            let embeddings = embedder.embed(&texts).await?;
            for ((text, url), embedding) in batch.iter().cloned().zip(embeddings) {
                entries.push(IndexEntry {
                    text,
                    url,
                    embedding,
                });
            }
        }

        Ok(Self {
            embedding_model: embedding_model.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir).map_err(|source| IndexError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(INDEX_FILE);
        let encoded = serde_json::to_string(self).map_err(IndexError::Encode)?;
        fs::write(&path, encoded).map_err(|source| IndexError::Write { path, source })
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let path = dir.join(INDEX_FILE);
        let raw = fs::read_to_string(&path).map_err(|source| IndexError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| IndexError::Decode { path, source })
    }

    // Entries ranked by cosine similarity against the query, best first
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<&IndexEntry> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.embedding)))
            .collect();
        scored.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| &self.entries[i])
            .collect()
    }
}

// Split text into overlapping character windows
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == total {
            break;
        }
        start += step;
    }
    chunks
}

// Mismatched or degenerate vectors score zero, ranking is best-effort
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
