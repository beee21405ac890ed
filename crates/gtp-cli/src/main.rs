//! GTP proxy
//!
//! Spawns a GTP engine and relays lines typed on stdin to it. Responses are
//! printed in GTP form, in the order the commands were sent, while streaming
//! commands keep printing until a blank line cancels them.
//!
//! Usage: `gtp-proxy [--json] <program> [args...]`

use anyhow::{Result, anyhow};
use gtp_client::{GtpError, Response, Session};
use gtp_core::analysis::{RECORD_MARKER, parse_analysis_line};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE: &str = "usage: gtp-proxy [--json] <program> [args...]";

struct Options {
    json: bool,
    program: String,
    args: Vec<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Options> {
    let mut json = false;
    let program = loop {
        match args.next() {
            Some(arg) if arg == "--json" => json = true,
            Some(arg) if arg == "-h" || arg == "--help" => return Err(anyhow!(USAGE)),
            Some(arg) => break arg,
            None => return Err(anyhow!(USAGE)),
        }
    };

    Ok(Options {
        json,
        program,
        args: args.collect(),
    })
}

/// Render one body line, decoding analysis records in JSON mode
fn render_line(line: &str, json: bool) -> String {
    if json && line.split_whitespace().next() == Some(RECORD_MARKER) {
        match parse_analysis_line(line).map(|records| serde_json::to_string(&records)) {
            Ok(Ok(rendered)) => return rendered,
            Ok(Err(e)) => warn!("Failed to serialize analysis: {}", e),
            Err(e) => warn!("Failed to decode analysis line: {}", e),
        }
    }
    line.to_string()
}

/// Print responses one after another as their lines arrive
async fn print_responses(mut rx: mpsc::UnboundedReceiver<Response>, json: bool) -> Result<()> {
    let mut out = tokio::io::stdout();

    while let Some(mut response) = rx.recv().await {
        let marker = if response.ok() { '=' } else { '?' };
        let mut first = true;

        loop {
            let line = match response.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Response to '{}' ended: {}", response.command(), e);
                    break;
                }
            };

            let text = if first {
                first = false;
                format!("{} {}\n", marker, render_line(&line, json))
            } else {
                format!("{}\n", render_line(&line, json))
            };
            out.write_all(text.as_bytes()).await?;
            out.flush().await?;
        }

        if first {
            out.write_all(format!("{}\n", marker).as_bytes()).await?;
        }
        out.write_all(b"\n").await?;
        out.flush().await?;
    }

    Ok(())
}

fn is_quit(line: &str) -> bool {
    gtp_client::strip_command(line).is_ok_and(|command| command == "quit")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = parse_args(std::env::args().skip(1))?;

    info!("Starting engine: {} {}", options.program, options.args.join(" "));
    let session = Arc::new(
        Session::spawn(&options.program, &options.args)
            .await
            .map_err(|e| anyhow!("Failed to start engine: {}", e))?,
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_responses(rx, options.json));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            session.cancel_streaming().await?;
            continue;
        }
        if is_quit(&line) {
            break;
        }

        match session.send(&line).await {
            Ok(response) => {
                if tx.send(response).is_err() {
                    break;
                }
            }
            Err(GtpError::EmptyCommand) => continue,
            Err(e) => {
                if e.is_fatal() || !session.is_open().await {
                    error!("Session failed: {}", e);
                    return Err(e.into());
                }
                warn!("Command not sent: {}", e);
            }
        }
    }

    // Stop any analysis still printing so the printer can drain
    if let Err(e) = session.cancel_streaming().await {
        warn!("Failed to cancel streaming: {}", e);
    }
    drop(tx);
    printer.await??;

    session
        .shutdown()
        .await
        .map_err(|e| anyhow!("Shutdown failed: {}", e))?;

    info!("GTP proxy shutting down");
    Ok(())
}
