//! I/O primitives for communicating with the Claude CLI subprocess.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::{Error, Result};

/// Upper bound on retained stderr output.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// A source of output lines.
///
/// `next_line` must be cancel safe: dropping the returned future before it
/// completes must not lose or split a line, so the next call still yields
/// whole lines in order.
pub trait LineSource: Send {
    /// Read the next line without its terminator. `Ok(None)` means EOF.
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Release whatever the source holds once the stream that reads it ends.
    fn close(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Reads newline-delimited lines from the CLI stdout.
///
/// Lines are framed with [`LinesCodec`], which keeps partially received data
/// in its buffer, so an interrupted read never hands out half a line.
pub struct ProcessReader<R = ChildStdout> {
    lines: FramedRead<R, LinesCodec>,
}

impl<R: AsyncRead + Unpin> ProcessReader<R> {
    /// Create a new reader over a child process stdout (or any byte stream).
    pub fn new(stdout: R) -> Self {
        Self {
            lines: FramedRead::new(stdout, LinesCodec::new()),
        }
    }

    /// Read the next line. Returns `Ok(None)` at EOF.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        match self.lines.next().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(codec_error(e)),
            None => Ok(None),
        }
    }
}

fn codec_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::Io(e) => Error::io(e),
        LinesCodecError::MaxLineLengthExceeded => Error::io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "line exceeds maximum length",
        )),
    }
}

impl<R: AsyncRead + Unpin + Send> LineSource for ProcessReader<R> {
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>>> + Send {
        self.read_line()
    }
}

impl<T: LineSource + Sync> LineSource for tokio::sync::OwnedMutexGuard<T> {
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>>> + Send {
        (**self).next_line()
    }

    fn close(&mut self) -> impl Future<Output = ()> + Send {
        (**self).close()
    }
}

/// Writes request lines to the CLI stdin.
pub struct ProcessWriter<W = ChildStdin> {
    stdin: W,
}

impl<W: AsyncWrite + Unpin> ProcessWriter<W> {
    /// Create a new writer from a child process stdin.
    pub fn new(stdin: W) -> Self {
        Self { stdin }
    }

    /// Write one line and flush it.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.write_lines(std::slice::from_ref(&line)).await
    }

    /// Write a batch of lines with a single flush at the end.
    ///
    /// The batch is assembled into one buffer first so the CLI sees the
    /// whole burst in as few reads as possible.
    pub async fn write_lines<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        let mut buf = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + 1).sum());
        for line in lines {
            buf.push_str(line.as_ref());
            buf.push('\n');
        }
        self.stdin
            .write_all(buf.as_bytes())
            .await
            .map_err(Error::io)?;
        self.stdin.flush().await.map_err(Error::io)
    }

    /// Close stdin, signalling end of input to the CLI.
    pub async fn close(&mut self) -> Result<()> {
        self.stdin.shutdown().await.map_err(Error::io)
    }
}

/// Drains the CLI stderr in the background.
///
/// Each line is logged at debug level under the `claude_subprocess::stderr`
/// target and kept (up to a fixed size) for error reports.
pub struct StderrCollector {
    buffer: Arc<Mutex<String>>,
    task: Option<JoinHandle<()>>,
}

impl StderrCollector {
    /// Start draining `stderr`. Must be called within a tokio runtime.
    pub fn spawn<R>(stderr: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&buffer);
        let task = tokio::spawn(async move {
            // Byte framing: stderr is free-form, so bad UTF-8 must not stop the drain.
            let mut reader = BufReader::new(stderr);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "stderr drain failed");
                        break;
                    }
                }
                let text = String::from_utf8_lossy(&raw);
                let line = text.trim_end_matches(['\n', '\r']);
                tracing::debug!(target: "claude_subprocess::stderr", "{line}");
                let mut buf = sink.lock().unwrap_or_else(|e| e.into_inner());
                if buf.len() + line.len() < MAX_STDERR_BYTES {
                    buf.push_str(line);
                    buf.push('\n');
                }
            }
        });
        Self {
            buffer,
            task: Some(task),
        }
    }

    /// Output collected so far.
    pub fn snapshot(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Wait (bounded) for stderr to reach EOF and return everything collected.
    pub async fn finish(&mut self, wait: Duration) -> String {
        if let Some(task) = self.task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(wait, task).await.is_err() {
                abort.abort();
            }
        }
        self.snapshot()
    }

    /// Stop draining.
    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for StderrCollector {
    fn drop(&mut self) {
        self.abort();
    }
}
