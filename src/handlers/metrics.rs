use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder};

// metrics endpoint, prometheus text format
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {err}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
