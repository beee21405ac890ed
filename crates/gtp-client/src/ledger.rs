//! In-flight command tracking
//!
//! A [`Command`] is shared between the reader task, which is the only writer
//! of its state, and any number of callers observing it. Every state change
//! wakes the observers; nobody polls.

use gtp_core::{GtpError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Default)]
struct CommandState {
    /// Response body lines in arrival order
    lines: Vec<String>,
    /// Status line received
    ready: bool,
    /// Status was success; meaningful once `ready`
    ok: bool,
    /// Terminating blank line received
    finished: bool,
    /// Session died before the command finished
    aborted: Option<GtpError>,
}

/// One request/response exchange with the engine
#[derive(Debug)]
pub(crate) struct Command {
    id: u64,
    text: String,
    state: Mutex<CommandState>,
    changed: Notify,
}

impl Command {
    pub(crate) fn new(id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            state: Mutex::new(CommandState::default()),
            changed: Notify::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The command line as sent
    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    fn state(&self) -> MutexGuard<'_, CommandState> {
        // State stays consistent across a panicking holder; every update is one assignment
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut CommandState)) {
        {
            let mut state = self.state();
            f(&mut *state);
        }
        self.changed.notify_waiters();
    }

    // === Reader side ===

    pub(crate) fn is_ready(&self) -> bool {
        self.state().ready
    }

    pub(crate) fn mark_ready(&self, ok: bool) {
        self.update(|state| {
            if !state.ready {
                state.ok = ok;
                state.ready = true;
            }
        });
    }

    pub(crate) fn push_line(&self, line: String) {
        self.update(|state| state.lines.push(line));
    }

    pub(crate) fn finish(&self) {
        self.update(|state| state.finished = true);
    }

    pub(crate) fn abort(&self, err: GtpError) {
        self.update(|state| {
            if !state.finished && state.aborted.is_none() {
                state.aborted = Some(err);
            }
        });
    }

    // === Caller side ===

    pub(crate) fn is_finished(&self) -> bool {
        self.state().finished
    }

    /// Suspend until `check` yields a value, re-checking after every state change
    async fn wait_for<T>(&self, mut check: impl FnMut(&CommandState) -> Option<T>) -> T {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = {
                let state = self.state();
                check(&state)
            };
            if let Some(value) = outcome {
                return value;
            }

            notified.await;
        }
    }

    /// Wait for the status line and return its success flag
    pub(crate) async fn wait_ready(&self) -> Result<bool> {
        self.wait_for(|state| {
            if state.ready {
                Some(Ok(state.ok))
            } else {
                state.aborted.clone().map(Err)
            }
        })
        .await
    }

    /// Wait for body line `index`, or `None` once the body is complete
    pub(crate) async fn line_at(&self, index: usize) -> Result<Option<String>> {
        self.wait_for(|state| {
            if let Some(line) = state.lines.get(index) {
                Some(Ok(Some(line.clone())))
            } else if state.finished {
                Some(Ok(None))
            } else {
                state.aborted.clone().map(Err)
            }
        })
        .await
    }

    /// Wait for the terminator and return body lines from `start` on
    pub(crate) async fn wait_finished(&self, start: usize) -> Result<Vec<String>> {
        self.wait_for(|state| {
            if state.finished {
                Some(Ok(state.lines.get(start..).unwrap_or_default().to_vec()))
            } else {
                state.aborted.clone().map(Err)
            }
        })
        .await
    }
}

/// Producer side of the ledger, held by the session writer
pub(crate) struct Ledger {
    tx: mpsc::UnboundedSender<Arc<Command>>,
}

/// Consumer side of the ledger, owned by the reader task
pub(crate) struct LedgerReceiver {
    rx: mpsc::UnboundedReceiver<Arc<Command>>,
}

/// Create an empty FIFO ledger
pub(crate) fn ledger() -> (Ledger, LedgerReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Ledger { tx }, LedgerReceiver { rx })
}

impl Ledger {
    /// Queue a command whose line has been written
    pub(crate) fn enqueue(&self, command: Arc<Command>) -> Result<()> {
        self.tx.send(command).map_err(|_| GtpError::SessionClosed)
    }
}

impl LedgerReceiver {
    /// Oldest unanswered command; `None` once the ledger is closed and drained
    pub(crate) async fn next(&mut self) -> Option<Arc<Command>> {
        self.rx.recv().await
    }

    /// Refuse further commands and abort everything still queued
    pub(crate) fn close(&mut self, err: &GtpError) {
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            command.abort(err.clone());
        }
    }
}
