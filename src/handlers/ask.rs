use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::errors::AskError;
use crate::state::AppState;
use crate::worker::AskJob;

#[derive(Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Serialize)]
pub struct AskErrorResponse {
    pub error: String,
}

// POST /api/ask handler: queue the question for the worker and wait
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<AskErrorResponse>)> {
    let (respond_tx, respond_rx) = oneshot::channel();
    let job = AskJob {
        caller: "http".to_string(),
        question: payload.question,
        respond_tx,
    };

    state
        .ask_tx
        .send(job)
        .await
        .map_err(|_| internal("failed to queue question"))?;

    let result = respond_rx
        .await
        .map_err(|_| internal("worker failed to respond"))?;

    match result {
        Ok(answer) => Ok(Json(AskResponse { answer })),
        Err(err) => {
            let code = match &err {
                AskError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                AskError::Invalid(_) => StatusCode::BAD_REQUEST,
                AskError::Downstream(_) => StatusCode::BAD_GATEWAY,
            };
            Err((
                code,
                Json(AskErrorResponse {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

fn internal(message: &str) -> (StatusCode, Json<AskErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AskErrorResponse {
            error: message.to_string(),
        }),
    )
}
