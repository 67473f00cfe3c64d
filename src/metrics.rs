use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};

lazy_static! {
    pub static ref QUESTIONS_TOTAL: Counter =
        register_counter!("sitebot_questions_total", "Total number of questions").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter = register_counter!(
        "sitebot_rate_limited_total",
        "Questions rejected by the rate limiter"
    )
    .unwrap();
    pub static ref VALIDATION_REJECTED_TOTAL: Counter = register_counter!(
        "sitebot_validation_rejected_total",
        "Questions rejected by the input validator"
    )
    .unwrap();
    pub static ref QUERY_FAILURES_TOTAL: Counter = register_counter!(
        "sitebot_query_failures_total",
        "Failures from the query engine"
    )
    .unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("sitebot_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("sitebot_cache_misses_total", "Total cache misses").unwrap();
    pub static ref QUERY_LATENCY: Histogram = register_histogram!(
        "sitebot_query_latency_seconds",
        "Query latency in seconds"
    )
    .unwrap();
    pub static ref INDEX_CHUNKS: Gauge = register_gauge!(
        "sitebot_index_chunks",
        "Number of chunks in the loaded index"
    )
    .unwrap();
}
