use tokio::sync::mpsc;

use crate::worker::AskJob;

// Shared state for the HTTP surface: handlers only ever talk to the
// worker through this channel
pub struct AppState {
    pub ask_tx: mpsc::Sender<AskJob>,
}
