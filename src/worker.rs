use tokio::sync::{mpsc, oneshot};

use crate::chatbot::Chatbot;
use crate::errors::AskError;

// One queued question plus the channel to answer on
pub struct AskJob {
    pub caller: String,
    pub question: String,
    pub respond_tx: oneshot::Sender<Result<String, AskError>>,
}

// Owns the chatbot and processes questions from the queue one at a
// time, which is what keeps the shared limiter and cache safe under
// concurrent HTTP callers.
pub async fn ask_worker(mut rx: mpsc::Receiver<AskJob>, chatbot: Chatbot) {
    tracing::info!("ask worker started, processing questions sequentially");

    while let Some(job) = rx.recv().await {
        let result = chatbot.ask(&job.caller, &job.question).await;
        // The handler may have given up waiting; nothing to do then
        let _ = job.respond_tx.send(result);
    }
}
