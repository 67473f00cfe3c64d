mod cache;
mod chatbot;
mod config;
mod crawler;
mod embeddings;
mod errors;
mod handlers;
mod index;
mod metrics;
mod query;
mod rate_limit;
mod state;
mod validate;
mod worker;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::chatbot::{Chatbot, ChatbotOptions};
use crate::config::Args;
use crate::handlers::{ask_handler, health_handler, metrics_handler};
use crate::rate_limit::RateLimitConfig;
use crate::state::AppState;
use crate::worker::{AskJob, ask_worker};

// this is main async function with tokio
#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    let _log_guard = init_logging(&args.log_dir);

    let opts = ChatbotOptions {
        rate_limit: RateLimitConfig {
            max_requests: args.rate_limit,
            window: Duration::from_secs(args.rate_window),
            cooldown: Duration::from_secs(args.cooldown),
        },
        max_question_length: args.max_question_len,
        banned_chars: args.banned_chars.clone(),
        cache_ttl: Duration::from_secs(args.cache_ttl),
        top_k: args.top_k,
        embedding_model: args.embedding_model.clone(),
        chat_model: args.chat_model.clone(),
    };

    // Construction may crawl and embed, which is slow; anything that
    // fails here is fatal
    let chatbot = match Chatbot::build(&opts, &args.config, &args.persist_dir).await {
        Ok(chatbot) => chatbot,
        Err(err) => {
            tracing::error!("startup failed: {err}");
            eprintln!("sitebot: {err}");
            std::process::exit(1);
        }
    };

    if args.serve {
        run_server(chatbot, args.port).await;
    } else {
        run_chat_loop(chatbot).await;
    }
}

// File log with timestamps plus warnings on stderr, so the chat prompt
// stays readable
fn init_logging(log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "sitebot.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_filter(LevelFilter::WARN),
        )
        .init();
    guard
}

// Line-oriented loop: read a question, print the reply, stop on "exit".
// Failures are printed as replies; the loop itself never dies on one.
async fn run_chat_loop(chatbot: Chatbot) {
    println!("Chatbot is ready! Type 'exit' to quit.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("You: ");
        let _ = io::stdout().flush();

        let Some(Ok(line)) = lines.next() else {
            break;
        };
        let is_exit = line.trim().eq_ignore_ascii_case("exit");

        let reply = match chatbot.ask("local", &line).await {
            Ok(answer) => answer,
            Err(err) => err.to_string(),
        };
        println!("Chatbot: {reply}");

        if is_exit {
            break;
        }
    }
}

async fn run_server(chatbot: Chatbot, port: u16) {
    let (ask_tx, ask_rx) = mpsc::channel::<AskJob>(100);

    // Single worker owns the chatbot and serializes all questions
    tokio::spawn(async move {
        ask_worker(ask_rx, chatbot).await;
    });

    let app_state = Arc::new(AppState { ask_tx });
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/ask", post(ask_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(app_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {addr}: {err}");
            eprintln!("sitebot: failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!("http surface listening on {addr}");
    println!("sitebot serving on http://localhost:{port}");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("server error: {err}");
    }
}
