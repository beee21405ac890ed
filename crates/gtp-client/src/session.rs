//! GTP session façade
//!
//! A [`Session`] owns the engine process, the write side of its stdin and the
//! background reader. Callers share it (`&Session` or `Arc<Session>`) and get
//! a [`Response`] back for every command they send.

use crate::ledger::{Command, Ledger, ledger};
use crate::reader::{SessionStatus, reader_task};
use crate::transport::{LineReader, LineWriter, PipeReader, PipeWriter};
use gtp_core::{GtpError, Result};
use std::ffi::OsStr;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Command sent by [`Session::shutdown`]
const QUIT_COMMAND: &str = "quit";

/// Write side of the session; `None` once shut down
struct Channel {
    writer: Box<dyn LineWriter>,
    ledger: Ledger,
}

/// Client session with one GTP engine
pub struct Session {
    /// Engine stdin and the ledger, locked together for write + enqueue
    channel: Mutex<Option<Channel>>,
    /// Failure recorded by the reader task
    status: Arc<SessionStatus>,
    /// Engine process, if this session spawned it
    child: Mutex<Option<Child>>,
    /// Background reader task handle
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    /// Engine stderr forwarder handle
    stderr_handle: Mutex<Option<JoinHandle<()>>>,
    /// Next command id, used in logs
    next_id: AtomicU64,
}

/// Fails the session if dropped between the start of a write and the enqueue
///
/// A send future dropped at that point may leave a partial line on the wire,
/// which the next command would run into.
struct WriteGuard<'a> {
    status: &'a SessionStatus,
    text: &'a str,
    armed: bool,
}

impl<'a> WriteGuard<'a> {
    fn arm(status: &'a SessionStatus, text: &'a str) -> Self {
        Self {
            status,
            text,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Write of '{}' did not complete, closing session", self.text);
            self.status.fail(GtpError::Io(format!(
                "Write of '{}' did not complete",
                self.text
            )));
        }
    }
}

/// Strip a `#` comment and surrounding whitespace from a command line
pub fn strip_command(text: &str) -> Result<&str> {
    let text = text.split_once('#').map_or(text, |(command, _)| command).trim();

    if text.is_empty() {
        return Err(GtpError::EmptyCommand);
    }
    if text.contains(['\n', '\r']) {
        return Err(GtpError::InvalidArgument(format!(
            "command must be a single line: {:?}",
            text
        )));
    }

    Ok(text)
}

impl Session {
    /// Spawn an engine process and start the session
    pub async fn spawn<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GtpError::Io(format!("Failed to spawn {:?}: {}", program, e)))?;

        info!("Spawned engine {:?} (pid {:?})", program, child.id());

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GtpError::Io("No stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GtpError::Io("No stdout".into()))?;
        let stderr = child.stderr.take();

        let mut session = Self::from_transport(PipeReader::new(stdout), PipeWriter::new(stdin));
        *session.child.get_mut() = Some(child);
        *session.stderr_handle.get_mut() = stderr.map(|stderr| tokio::spawn(forward_stderr(stderr)));

        Ok(session)
    }

    /// Start a session over existing byte pipes to an engine
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_pipes<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::from_transport(PipeReader::new(reader), PipeWriter::new(writer))
    }

    /// Start a session over a line transport
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_transport<R, W>(reader: R, writer: W) -> Self
    where
        R: LineReader + 'static,
        W: LineWriter + 'static,
    {
        let (ledger, ledger_rx) = ledger();
        let status = Arc::new(SessionStatus::default());
        let handle = tokio::spawn(reader_task(reader, ledger_rx, status.clone()));

        Self {
            channel: Mutex::new(Some(Channel {
                writer: Box::new(writer),
                ledger,
            })),
            status,
            child: Mutex::new(None),
            reader_handle: Mutex::new(Some(handle)),
            stderr_handle: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a command and wait for its status line
    ///
    /// The returned [`Response`] carries the success flag and streams the
    /// body. For commands that never finish on their own (`lz-analyze`),
    /// call [`Session::cancel_streaming`] before waiting for completion.
    pub async fn send(&self, text: &str) -> Result<Response> {
        let text = strip_command(text)?;

        let command = {
            let mut guard = self.channel.lock().await;
            let channel = guard.as_mut().ok_or(GtpError::SessionClosed)?;
            self.status.check()?;

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let command = Arc::new(Command::new(id, text));
            debug!("[#{}] >> {}", id, text);

            let line = format!("{}\n", text);
            let write_guard = WriteGuard::arm(&self.status, text);
            channel.writer.write_all(line.as_bytes()).await?;

            // Enqueued under the same lock as the write, so ledger order is wire order
            channel
                .ledger
                .enqueue(command.clone())
                .map_err(|_| self.status.failure().unwrap_or(GtpError::SessionClosed))?;
            write_guard.disarm();
            command
        };

        let ok = command.wait_ready().await?;
        Ok(Response::new(command, ok))
    }

    /// Stop a streaming command by sending an empty line
    pub async fn cancel_streaming(&self) -> Result<()> {
        let mut guard = self.channel.lock().await;
        let channel = guard.as_mut().ok_or(GtpError::SessionClosed)?;
        self.status.check()?;

        debug!(">> (cancel streaming)");
        channel.writer.write_all(b"\n").await
    }

    /// Whether the session still accepts commands
    pub async fn is_open(&self) -> bool {
        self.channel.lock().await.is_some() && self.status.failure().is_none()
    }

    /// Send `quit`, wait for the engine to exit and stop the reader
    ///
    /// Later sends fail with [`GtpError::SessionClosed`]. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        if self.channel.lock().await.is_none() {
            return Ok(());
        }

        match self.send(QUIT_COMMAND).await {
            Ok(response) => {
                if let Err(e) = response.collect().await {
                    warn!("Engine did not finish answering quit: {}", e);
                }
            }
            Err(e) => warn!("Failed to send quit: {}", e),
        }

        // Dropping the channel closes stdin and lets the reader drain out
        drop(self.channel.lock().await.take());

        if let Some(mut child) = self.child.lock().await.take() {
            // A broken engine may never exit on its own
            if let Some(failure) = self.status.failure() {
                warn!("Killing engine after session failure: {}", failure);
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill engine: {}", e);
                }
            }
            let exit = child
                .wait()
                .await
                .map_err(|e| GtpError::Io(format!("Failed to wait for engine: {}", e)))?;
            info!("Engine exited with {}", exit);
        }

        if let Some(handle) = self.reader_handle.lock().await.take() {
            handle
                .await
                .map_err(|e| GtpError::Io(format!("Reader task panicked: {}", e)))?;
        }

        if let Some(handle) = self.stderr_handle.lock().await.take() {
            let _ = handle.await;
        }

        info!("Session shut down");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Try to kill the engine if it was never shut down
        if let Some(child) = self.child.get_mut().as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Relay engine stderr into the log
async fn forward_stderr(stderr: ChildStderr) {
    let mut reader = PipeReader::new(stderr);
    loop {
        match reader.read_line().await {
            Ok(Some(line)) => debug!(target: "gtp_client::engine", "{}", line),
            Ok(None) => break,
            Err(e) => {
                warn!("Engine stderr read failed: {}", e);
                break;
            }
        }
    }
}

/// Answer to one command
///
/// Holds the status flag and a cursor over the body lines. The body can be
/// consumed line by line as it arrives, or collected once complete.
#[derive(Debug)]
pub struct Response {
    command: Arc<Command>,
    ok: bool,
    cursor: usize,
}

impl Response {
    pub(crate) fn new(command: Arc<Command>, ok: bool) -> Self {
        Self {
            command,
            ok,
            cursor: 0,
        }
    }

    /// Whether the engine reported success
    pub fn ok(&self) -> bool {
        self.ok
    }

    /// The command line this answers
    pub fn command(&self) -> &str {
        self.command.text()
    }

    /// Whether the terminating blank line has been received
    pub fn is_finished(&self) -> bool {
        self.command.is_finished()
    }

    /// Next body line, waiting for it if needed; `None` at the end of the body
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let line = self.command.line_at(self.cursor).await?;
        if line.is_some() {
            self.cursor += 1;
        }
        Ok(line)
    }

    /// Wait for the end of the body and return the lines not yet consumed
    pub async fn collect(self) -> Result<Vec<String>> {
        self.command.wait_finished(self.cursor).await
    }

    /// Collect the body, turning a failure status into an error
    pub async fn into_result(self) -> Result<Vec<String>> {
        let ok = self.ok;
        let command = self.command.text().to_string();
        let lines = self.collect().await?;

        if ok {
            Ok(lines)
        } else {
            Err(GtpError::CommandFailed {
                command,
                message: lines.join("\n"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_session;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

    #[test]
    fn test_strip_command() {
        assert_eq!(strip_command("  name  ").unwrap(), "name");
        assert_eq!(strip_command("play b d4 # opening").unwrap(), "play b d4");
        assert_eq!(strip_command("# only a comment"), Err(GtpError::EmptyCommand));
        assert_eq!(strip_command("   "), Err(GtpError::EmptyCommand));
        assert!(matches!(
            strip_command("name\nversion"),
            Err(GtpError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_wire_framing() {
        let mock = tokio_test::io::Builder::new()
            .write(b"protocol_version\n")
            .read(b"=2\n\n")
            .build();
        let (reader, writer) = tokio::io::split(mock);
        let session = Session::from_pipes(reader, writer);

        let response = session.send("  protocol_version # which one?\n").await.unwrap();
        assert!(response.ok());
        assert_eq!(response.command(), "protocol_version");
        assert_eq!(response.collect().await.unwrap(), vec!["2"]);
    }

    #[tokio::test]
    async fn test_protocol_version() {
        let session = fake_session();

        let response = session.send("protocol_version").await.unwrap();
        assert!(response.ok());
        assert_eq!(response.collect().await.unwrap(), vec!["2"]);
    }

    #[tokio::test]
    async fn test_failure_status() {
        let session = fake_session();

        let response = session.send("boardsize 0").await.unwrap();
        assert!(!response.ok());
        assert_eq!(response.collect().await.unwrap(), vec!["unacceptable size"]);

        let err = session
            .send("boardsize 0")
            .await
            .unwrap()
            .into_result()
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GtpError::CommandFailed {
                command: "boardsize 0".into(),
                message: "unacceptable size".into(),
            }
        );

        // Session stays usable
        assert!(session.send("protocol_version").await.unwrap().ok());
    }

    #[tokio::test]
    async fn test_empty_command_is_not_sent() {
        let session = fake_session();

        assert!(matches!(
            session.send(" # nothing").await,
            Err(GtpError::EmptyCommand)
        ));
        assert_eq!(
            session.send("echo still here").await.unwrap().collect().await.unwrap(),
            vec!["still", "here"]
        );
    }

    #[tokio::test]
    async fn test_fifo_ordering() {
        let session = fake_session();

        let (r1, r2, r3) = tokio::join!(
            session.send("echo one uno"),
            session.send("echo two dos"),
            session.send("echo three tres"),
        );
        let (r1, mut r2, r3) = (r1.unwrap(), r2.unwrap(), r3.unwrap());

        assert_eq!(r3.command(), "echo three tres");
        assert_eq!(r3.collect().await.unwrap(), vec!["three", "tres"]);

        assert_eq!(r2.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(r2.collect().await.unwrap(), vec!["dos"]);

        assert_eq!(r1.command(), "echo one uno");
        assert_eq!(r1.collect().await.unwrap(), vec!["one", "uno"]);
    }

    #[tokio::test]
    async fn test_fifo_while_first_response_streams() {
        let (client, engine) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(client);
        let session = Arc::new(Session::from_pipes(reader, writer));
        let (engine_reader, mut engine_out) = tokio::io::split(engine);
        let mut engine_in = BufReader::new(engine_reader).lines();

        engine_out.write_all(b"=\ninfo a\n").await.unwrap();
        let mut r1 = session.send("lz-analyze 10").await.unwrap();
        assert_eq!(engine_in.next_line().await.unwrap().as_deref(), Some("lz-analyze 10"));
        assert_eq!(r1.next_line().await.unwrap().as_deref(), Some("info a"));

        let s = session.clone();
        let c2 = tokio::spawn(async move { s.send("name").await.unwrap().collect().await.unwrap() });
        assert_eq!(engine_in.next_line().await.unwrap().as_deref(), Some("name"));

        let s = session.clone();
        let c3 = tokio::spawn(async move { s.send("echo x").await.unwrap().collect().await.unwrap() });
        assert_eq!(engine_in.next_line().await.unwrap().as_deref(), Some("echo x"));

        // c1 is still open, so nothing behind it may resolve
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!r1.is_finished());
        assert!(!c2.is_finished());
        assert!(!c3.is_finished());

        engine_out
            .write_all(b"info b\n\n= KataGo\n\n= x\n\n")
            .await
            .unwrap();

        assert_eq!(c3.await.unwrap(), vec!["x"]);
        assert_eq!(c2.await.unwrap(), vec!["KataGo"]);
        assert_eq!(r1.collect().await.unwrap(), vec!["info b"]);
    }

    #[tokio::test]
    async fn test_concurrent_callers() {
        let session = Arc::new(fake_session());

        let mut handles = Vec::new();
        for i in 0..20 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                let lines = session
                    .send(&format!("echo caller {}", i))
                    .await
                    .unwrap()
                    .collect()
                    .await
                    .unwrap();
                assert_eq!(lines, vec!["caller".to_string(), i.to_string()]);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_streaming_cancellation() {
        let session = fake_session();

        let mut response = session.send("lz-analyze 10").await.unwrap();
        assert!(response.ok());

        for _ in 0..3 {
            let line = response.next_line().await.unwrap().unwrap();
            assert!(line.starts_with("info move"));
        }
        assert!(!response.is_finished());

        session.cancel_streaming().await.unwrap();

        // Remaining buffered lines drain, then the sequence ends
        while response.next_line().await.unwrap().is_some() {}
        assert!(response.is_finished());

        assert!(session.send("protocol_version").await.unwrap().ok());
    }

    #[tokio::test]
    async fn test_malformed_response_closes_session() {
        let session = fake_session();

        assert!(matches!(
            session.send("garbage").await,
            Err(GtpError::Protocol(_))
        ));
        assert!(matches!(
            session.send("protocol_version").await,
            Err(GtpError::Protocol(_))
        ));
        assert!(!session.is_open().await);
        assert!(matches!(
            session.cancel_streaming().await,
            Err(GtpError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_interrupted_write_closes_session() {
        let (client, mut engine) = tokio::io::duplex(8);
        let (reader, writer) = tokio::io::split(client);
        let session = Session::from_pipes(reader, writer);

        // Engine is not reading, so the write stalls once the pipe is full
        let sent = tokio::time::timeout(
            Duration::from_millis(50),
            session.send("boardsize 19 extra"),
        )
        .await;
        assert!(sent.is_err());

        assert!(matches!(session.send("name").await, Err(GtpError::Io(_))));
        assert!(matches!(
            session.cancel_streaming().await,
            Err(GtpError::Io(_))
        ));
        assert!(!session.is_open().await);

        // Nothing was appended to the fragment
        session.shutdown().await.unwrap();
        drop(session);
        let mut received = Vec::new();
        engine.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"boardsiz");
    }

    #[tokio::test]
    async fn test_write_failure() {
        let (client, engine) = tokio::io::duplex(64);
        drop(engine);
        let (reader, writer) = tokio::io::split(client);
        let session = Session::from_pipes(reader, writer);

        assert!(matches!(session.send("name").await, Err(GtpError::Io(_))));
    }

    #[tokio::test]
    async fn test_shutdown() {
        let session = fake_session();

        session.shutdown().await.unwrap();
        assert!(!session.is_open().await);
        assert_eq!(session.send("name").await.unwrap_err(), GtpError::SessionClosed);
        assert_eq!(session.cancel_streaming().await, Err(GtpError::SessionClosed));

        // Idempotent
        session.shutdown().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawned_stub_engine() {
        let script = r#"
            while read -r line; do
                case "$line" in
                    protocol_version) printf '=2\n\n' ;;
                    "boardsize 0") printf '? unacceptable size\n\n' ;;
                    quit) printf '=\n\n'; exit 0 ;;
                    *) printf '? unknown command\n\n' ;;
                esac
            done
        "#;
        let session = Session::spawn("sh", ["-c", script]).await.unwrap();

        let response = session.send("protocol_version").await.unwrap();
        assert!(response.ok());
        assert_eq!(response.collect().await.unwrap(), vec!["2"]);

        let response = session.send("boardsize 0").await.unwrap();
        assert!(!response.ok());
        assert_eq!(response.collect().await.unwrap(), vec!["unacceptable size"]);

        session.shutdown().await.unwrap();
        assert_eq!(session.send("name").await.unwrap_err(), GtpError::SessionClosed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_kills_broken_engine() {
        // Answers without a status marker, then never exits
        let script = "read -r line; printf 'nonsense\\n\\n'; exec sleep 30";
        let session = Session::spawn("sh", ["-c", script]).await.unwrap();

        assert!(matches!(
            session.send("name").await,
            Err(GtpError::Protocol(_))
        ));

        tokio::time::timeout(Duration::from_secs(5), session.shutdown())
            .await
            .expect("shutdown hung")
            .unwrap();
    }
}
