use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use interview_client::{ChatSession, ClientError, HttpTransport, SessionSnapshot};
use interview_wire::MessageRole;

/// Chat with the AI interviewer from a terminal.
///
/// Each line read from stdin is sent as one turn; the reply is printed as it
/// streams in. Ctrl-C aborts the reply in progress, or exits when idle.
#[derive(Parser, Debug)]
#[command(name = "interview-chat", version)]
struct Cli {
    /// Base URL of the interview API.
    #[arg(long, env = "INTERVIEW_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Bearer session token.
    #[arg(long, env = "INTERVIEW_TOKEN")]
    token: String,

    /// Conversation to attach to.
    #[arg(long)]
    conversation: Uuid,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let transport = HttpTransport::new(cli.base_url, cli.token)?;
    let session = Arc::new(ChatSession::new(transport));
    session
        .attach(cli.conversation)
        .await
        .context("Failed to load conversation")?;

    for message in &session.snapshot().transcript {
        println!("{}: {}", message.role, message.content);
    }

    let printer = tokio::spawn(print_replies(session.subscribe()));

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let session = Arc::clone(&session);
        let shutdown = shutdown.clone();
        async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if !session.abort() {
                    shutdown.cancel();
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        match session.send(line).await {
            Ok(_) => {}
            Err(ClientError::Aborted) => eprintln!("[reply aborted]"),
            Err(e) => eprintln!("[turn failed: {e}]"),
        }
    }

    printer.abort();
    Ok(())
}

/// Prints each reply incrementally as the session snapshot changes.
async fn print_replies(mut updates: watch::Receiver<SessionSnapshot>) {
    let mut seen = updates.borrow().transcript.len();
    let mut shown = 0;

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        let mut stdout = std::io::stdout();

        if snapshot.streaming {
            if shown == 0 && !snapshot.partial.is_empty() {
                print!("assistant: ");
            }
            if let Some(fresh) = snapshot.partial.get(shown..) {
                print!("{fresh}");
                shown = snapshot.partial.len();
            }
        } else {
            // The final update may carry deltas that were never observed as partial.
            let mut printed = shown > 0;
            if snapshot.transcript.len() > seen {
                let rest = snapshot
                    .transcript
                    .last()
                    .filter(|m| m.role == MessageRole::Assistant)
                    .and_then(|m| m.content.get(shown..))
                    .filter(|rest| !rest.is_empty());
                if let Some(rest) = rest {
                    if !printed {
                        print!("assistant: ");
                    }
                    print!("{rest}");
                    printed = true;
                }
            }
            if printed {
                println!();
            }
            shown = 0;
            seen = snapshot.transcript.len();
        }
        let _ = stdout.flush();
    }
}
