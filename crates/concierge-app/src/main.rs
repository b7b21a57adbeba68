//! Concierge console binary - composition root.
//!
//! 1. Load configuration from TOML
//! 2. Load knowledge passages into the in-memory retriever
//! 3. Build the orchestrator
//! 4. Read guest utterances from stdin, one per line, and print answers

mod cli;

use std::sync::Arc;

use clap::Parser;
use concierge_chat::{ConciergeOrchestrator, InMemoryRetriever, TurnOutcome};
use concierge_core::ConciergeConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use cli::CliArgs;

const HELP: &str = "Commands: /clear, /booked, /sessions, /help, /quit. \
                    Anything else is sent to the concierge.";

fn render(outcome: &TurnOutcome, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(outcome)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e));
    }
    let mut out = outcome.answer.clone();
    if let Some(refined) = &outcome.refined_question {
        out.push_str(&format!("\n  (understood as: {})", refined));
    }
    if outcome.escalate {
        out.push_str("\n  (flagged for the reservations team)");
    }
    if !outcome.suggestions.is_empty() {
        out.push_str("\n  You could also ask:");
        for s in &outcome.suggestions {
            out.push_str(&format!("\n   - {}", s));
        }
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = ConciergeConfig::load_or_default(&config_file);

    // Tracing goes to stderr so answers on stdout stay clean.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting concierge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Knowledge.
    let retriever = match args.resolve_knowledge_path(config.general.knowledge_path.as_deref()) {
        Some(path) => {
            let retriever = InMemoryRetriever::load(&path)?;
            tracing::info!(path = %path.display(), passages = retriever.len(), "Knowledge loaded");
            retriever
        }
        None => {
            tracing::warn!("No knowledge file configured; only rule-based answers are available");
            InMemoryRetriever::default()
        }
    };

    let orchestrator = ConciergeOrchestrator::new(&config, Arc::new(retriever))?;
    tracing::info!(cottages = orchestrator.registry().len(), "Concierge ready");

    let mut session_id = args.session.clone();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout.write_all(format!("{}\n> ", HELP).as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let reply = match line {
            "" => String::new(),
            "/quit" | "/exit" => break,
            "/help" => HELP.to_string(),
            "/sessions" => {
                let sessions = orchestrator.list_sessions();
                serde_json::to_string_pretty(&sessions)?
            }
            "/clear" => match session_id.as_deref().map(|id| orchestrator.clear_session(id)) {
                Some(Ok(())) => "Conversation cleared.".to_string(),
                Some(Err(e)) => format!("error: {}", e),
                None => "No conversation yet.".to_string(),
            },
            "/booked" => match session_id.as_deref().map(|id| orchestrator.complete_booking(id)) {
                Some(Ok(stage)) => format!("Booking recorded; stage is now {}.", stage),
                Some(Err(e)) => format!("error: {}", e),
                None => "No conversation yet.".to_string(),
            },
            utterance => match orchestrator.handle_turn(session_id.as_deref(), utterance).await {
                Ok(outcome) => {
                    session_id = Some(outcome.session_id.clone());
                    render(&outcome, args.json)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Turn failed");
                    format!("error: {}", e)
                }
            },
        };
        if !reply.is_empty() {
            stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    tracing::info!("Goodbye");
    Ok(())
}
