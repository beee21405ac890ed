//! Scripted in-memory engine for tests

use crate::session::Session;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf};

/// Session connected to a [`run_fake_engine`] task
pub(crate) fn fake_session() -> Session {
    let (client, engine) = tokio::io::duplex(4096);
    tokio::spawn(run_fake_engine(engine));
    let (reader, writer) = tokio::io::split(client);
    Session::from_pipes(reader, writer)
}

/// Reply to a non-streaming command
fn reply(command: &str) -> String {
    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or("");
    let args: Vec<&str> = words.collect();

    match (name, args.as_slice()) {
        ("protocol_version", []) => "=2\n\n".into(),
        ("quit", []) => "=\n\n".into(),
        ("name", []) => "= KataGo\n\n".into(),
        ("version", []) => "= 1.13.0\n\n".into(),
        ("known_command", ["lz-analyze" | "name" | "play"]) => "= true\n\n".into(),
        ("known_command", _) => "= false\n\n".into(),
        ("list_commands", []) => "= protocol_version\nname\nversion\nlz-analyze\nplay\ngenmove\n\n".into(),
        ("boardsize", ["0"]) => "? unacceptable size\n\n".into(),
        ("boardsize" | "clear_board" | "komi" | "play", _) => "=\n\n".into(),
        ("genmove", ["b" | "B"]) => "= Q16\n\n".into(),
        ("genmove", _) => "= resign\n\n".into(),
        ("garbage", _) => "nonsense\n\n".into(),
        ("echo", words) => format!("= {}\n\n", words.join("\n")),
        _ => "? unknown command\n\n".into(),
    }
}

/// Emit analysis lines until any input arrives; returns that input
async fn stream_analysis(
    lines: &mut Lines<BufReader<ReadHalf<DuplexStream>>>,
    out: &mut tokio::io::WriteHalf<DuplexStream>,
) -> Option<String> {
    let mut ticker = tokio::time::interval(Duration::from_millis(5));
    let mut visits = 0;

    if out.write_all(b"=\n").await.is_err() {
        return None;
    }

    loop {
        tokio::select! {
            input = lines.next_line() => {
                let _ = out.write_all(b"\n").await;
                return input.ok().flatten();
            }
            _ = ticker.tick() => {
                visits += 10;
                let line = format!(
                    "info move D4 visits {} winrate 5500 prior 200 order 0 pv D4 C3 info move Q16 visits {}\n",
                    visits,
                    visits / 2
                );
                if out.write_all(line.as_bytes()).await.is_err() {
                    return None;
                }
            }
        }
    }
}

/// Minimal GTP engine: fixed replies, `echo`, and a streaming `lz-analyze`
///
/// Like real engines it ignores blank input lines, and any input stops an
/// analysis in progress; a non-blank line is then handled as a command.
pub(crate) async fn run_fake_engine(stream: DuplexStream) {
    let (reader, mut out) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut pending: Option<String> = None;

    loop {
        let line = match pending.take() {
            Some(line) => line,
            None => match lines.next_line().await {
                Ok(Some(line)) => line,
                _ => return,
            },
        };

        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        if command.starts_with("lz-analyze") {
            pending = stream_analysis(&mut lines, &mut out).await;
            continue;
        }

        if out.write_all(reply(command).as_bytes()).await.is_err() {
            return;
        }
        if command == "quit" {
            return;
        }
    }
}
