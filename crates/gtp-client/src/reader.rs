//! Background response reader
//!
//! One task per session owns the engine's output stream. It takes commands
//! from the ledger oldest first and feeds each one the lines that belong to
//! it, until the blank line that ends the response.

use crate::ledger::{Command, LedgerReceiver};
use crate::transport::LineReader;
use gtp_core::{GtpError, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

/// Success status marker
pub const SUCCESS_MARKER: char = '=';
/// Failure status marker
pub const FAILURE_MARKER: char = '?';

/// Fatal error recorded by the reader, shared with the session
#[derive(Debug, Default)]
pub(crate) struct SessionStatus {
    failure: Mutex<Option<GtpError>>,
}

impl SessionStatus {
    pub(crate) fn fail(&self, err: GtpError) {
        let mut failure = self.failure.lock().unwrap_or_else(|p| p.into_inner());
        failure.get_or_insert(err);
    }

    pub(crate) fn failure(&self) -> Option<GtpError> {
        self.failure
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Error out if the reader has stopped
    pub(crate) fn check(&self) -> Result<()> {
        match self.failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Background reader task
///
/// Runs until the ledger is closed and drained (normal shutdown), or until
/// the engine's output ends or breaks protocol. In the latter case the
/// failure is recorded in `status` and every unanswered command is aborted.
pub(crate) async fn reader_task<R: LineReader>(
    mut reader: R,
    mut ledger: LedgerReceiver,
    status: Arc<SessionStatus>,
) {
    let failure = loop {
        let Some(command) = ledger.next().await else {
            debug!("Ledger closed, reader task exiting");
            return;
        };

        if let Err(e) = read_response(&mut reader, &command).await {
            break (command, e);
        }
    };

    let (command, err) = failure;
    match &err {
        GtpError::SessionClosed => warn!("Engine output closed while waiting on '{}'", command.text()),
        _ => error!("Reader task failed on '{}': {}", command.text(), err),
    }

    status.fail(err.clone());
    command.abort(err.clone());
    ledger.close(&err);
}

/// Feed one command every line of its response
async fn read_response<R: LineReader>(reader: &mut R, command: &Command) -> Result<()> {
    loop {
        let raw = reader.read_line().await?.ok_or(GtpError::SessionClosed)?;
        debug!("[#{}] << {}", command.id(), raw);

        let mut content = raw.trim();

        if !command.is_ready() {
            // Blank padding before a status line carries nothing
            if content.is_empty() {
                continue;
            }

            let ok = match content.chars().next() {
                Some(SUCCESS_MARKER) => true,
                Some(FAILURE_MARKER) => false,
                _ => {
                    return Err(GtpError::Protocol(format!(
                        "Expected response to '{}' to start with '{}' or '{}', got '{}'",
                        command.text(),
                        SUCCESS_MARKER,
                        FAILURE_MARKER,
                        content
                    )));
                }
            };

            command.mark_ready(ok);
            // The status line's content may be empty; only a later blank line ends the response
            content = content[1..].trim();
            if !content.is_empty() {
                command.push_line(content.to_string());
            }
            continue;
        }

        if content.is_empty() {
            command.finish();
            return Ok(());
        }

        command.push_line(content.to_string());
    }
}
