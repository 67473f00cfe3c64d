use sha2::{Digest, Sha256};
use std::time::Instant;

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub answer: String,
    pub created_at: Instant,
}

// Create a cache key (hash of the sanitized question)
pub fn make_cache_key(question: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(question);
    format!("{:x}", hasher.finalize())
}
