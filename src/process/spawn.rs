//! Process spawning and lifecycle management.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use super::io::{ProcessReader, ProcessWriter, StderrCollector};
use super::kill;
use crate::{Error, Result};

/// How long `terminate` waits for the OS to confirm exit after the kill.
pub const TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a failed start waits for stderr to drain.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Everything needed to launch the CLI: an already resolved program, its
/// arguments, working directory and environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    /// `Some(value)` sets a variable, `None` removes it.
    pub env: BTreeMap<String, Option<String>>,
    /// Start from the parent's environment (otherwise from an empty one).
    pub inherit_env: bool,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            env: BTreeMap::new(),
            inherit_env: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), Some(value.into()));
        self
    }

    pub fn remove_env(mut self, key: impl Into<String>) -> Self {
        self.env.insert(key.into(), None);
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.working_directory {
            cmd.current_dir(dir);
        }

        if !self.inherit_env {
            cmd.env_clear();
        }
        for (key, value) in &self.env {
            match value {
                Some(value) => cmd.env(key, value),
                None => cmd.env_remove(key),
            };
        }

        // Own process group, so the whole tree can be killed at once.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// One CLI subprocess with piped stdin, stdout and stderr.
///
/// A session is started at most once. [`dispose`](Self::dispose) kills the
/// process tree if needed and releases every handle; it is idempotent and
/// never fails.
///
/// # Cancellation
///
/// Dropping a `ProcessSession` without disposing it kills the process group
/// (best effort) and the child itself.
pub struct ProcessSession {
    child: Option<Child>,
    pid: Option<u32>,
    writer: Option<ProcessWriter>,
    reader: Option<ProcessReader>,
    stderr: Option<StderrCollector>,
    program: String,
    /// Set by whichever call reaps the leader. Its pid may be reused after
    /// that, so the group is never signalled again.
    exit_status: Option<ExitStatus>,
    started: bool,
    disposed: bool,
}

impl Default for ProcessSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSession {
    /// Create an unstarted session.
    pub fn new() -> Self {
        Self {
            child: None,
            pid: None,
            writer: None,
            reader: None,
            stderr: None,
            program: String::new(),
            exit_status: None,
            started: false,
            disposed: false,
        }
    }

    /// Create and start a session in one step.
    pub async fn spawn(spec: &LaunchSpec) -> Result<Self> {
        let mut session = Self::new();
        session.start(spec).await?;
        Ok(session)
    }

    /// Launch the process described by `spec`.
    ///
    /// Fails with [`Error::ConnectionState`] when called a second time and
    /// with [`Error::ProcessStart`] when the OS refuses the launch or the
    /// process exits with a failure right away.
    pub async fn start(&mut self, spec: &LaunchSpec) -> Result<()> {
        if self.started {
            return Err(Error::ConnectionState(
                "process session already started".into(),
            ));
        }
        self.started = true;

        let program = spec.program_name();
        let mut child = spec
            .command()
            .spawn()
            .map_err(|source| Error::ProcessStart {
                program: program.clone(),
                stderr: None,
                source,
            })?;
        let pid = child.id();

        let (stdin, stdout, stderr) = match (
            child.stdin.take(),
            child.stdout.take(),
            child.stderr.take(),
        ) {
            (Some(stdin), Some(stdout), Some(stderr)) => (stdin, stdout, stderr),
            _ => {
                let _ = child.start_kill();
                return Err(Error::ProcessStart {
                    program,
                    stderr: None,
                    source: std::io::Error::other("stdio pipes were not captured"),
                });
            }
        };
        let mut stderr = StderrCollector::spawn(stderr);

        if let Ok(Some(status)) = child.try_wait() {
            if let Some(pid) = pid {
                let _ = kill::signal_group(pid);
            }
            if !status.success() {
                let text = stderr.finish(STDERR_GRACE).await;
                return Err(exit_error(program, status, text));
            }
            self.exit_status = Some(status);
        }

        tracing::debug!(pid = ?pid, program = %program, args = ?spec.args, "claude process started");

        self.child = Some(child);
        self.pid = pid;
        self.writer = Some(ProcessWriter::new(stdin));
        self.reader = Some(ProcessReader::new(stdout));
        self.stderr = Some(stderr);
        self.program = program;
        Ok(())
    }

    /// OS process ID, once started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Check if the process is still running.
    pub fn is_running(&mut self) -> bool {
        if self.exit_status.is_some() {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                self.record_exit(status);
                false
            }
            Err(_) => false,
        }
    }

    /// Exit status, once the process has been reaped.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Remember the first observed exit and sweep the leader's group.
    ///
    /// Only the call that reaps the leader may signal its group: until then
    /// the pid is still held by the zombie and cannot name anyone else.
    fn record_exit(&mut self, status: ExitStatus) {
        if self.exit_status.is_some() {
            return;
        }
        self.exit_status = Some(status);
        if let Some(pid) = self.pid {
            let _ = kill::signal_group(pid);
        }
        tracing::debug!(pid = ?self.pid, %status, "claude process exited");
    }

    /// Take the stdout line reader. It can only be taken once.
    pub fn take_reader(&mut self) -> Option<ProcessReader> {
        self.reader.take()
    }

    /// Take the stdin writer, e.g. to feed it from a separate task.
    pub fn take_writer(&mut self) -> Option<ProcessWriter> {
        self.writer.take()
    }

    /// Stderr collected so far.
    pub fn stderr_output(&self) -> String {
        self.stderr
            .as_ref()
            .map(StderrCollector::snapshot)
            .unwrap_or_default()
    }

    /// Write one line to stdin and flush.
    pub async fn write_line(&mut self, line: &str, cancel: &CancellationToken) -> Result<()> {
        self.write_lines(std::slice::from_ref(&line), cancel).await
    }

    /// Write a batch of lines with one flush.
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires first; in that case an
    /// unknown prefix of the batch may have been written.
    pub async fn write_lines<S: AsRef<str> + Sync>(
        &mut self,
        lines: &[S],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::ConnectionState("process input is not available".into()))?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = writer.write_lines(lines) => res,
        }
    }

    /// Close stdin so the CLI sees end of input.
    pub async fn close_input(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => writer.close().await,
            None => Ok(()),
        }
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| Error::ConnectionState("process is not running".into()))?;
        let status = child.wait().await.map_err(Error::io)?;
        self.record_exit(status);
        Ok(status)
    }

    /// Report a failed exit once stdout has reached EOF.
    ///
    /// Waits up to `limit` for the process to exit. A non-zero exit becomes
    /// [`Error::ProcessStart`] carrying the stderr output. A clean exit, or a
    /// process still running after `limit`, is `Ok`.
    pub async fn check_exit(&mut self, limit: Duration) -> Result<()> {
        let status = match self.exit_status {
            Some(status) => status,
            None => {
                let Some(child) = self.child.as_mut() else {
                    return Ok(());
                };
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(Ok(status)) => {
                        self.record_exit(status);
                        status
                    }
                    Ok(Err(e)) => return Err(Error::io(e)),
                    Err(_) => return Ok(()),
                }
            }
        };
        if status.success() {
            return Ok(());
        }
        let text = match self.stderr.as_mut() {
            Some(stderr) => stderr.finish(STDERR_GRACE).await,
            None => String::new(),
        };
        Err(exit_error(self.program.clone(), status, text))
    }

    /// Kill the process and its descendants and wait for the exit.
    ///
    /// A process that already exited is left alone; calling this repeatedly
    /// is fine. Failures are reported as [`Error::Interrupt`].
    pub async fn terminate(&mut self) -> Result<()> {
        if self.exit_status.is_some() {
            return Ok(());
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => return Err(Error::Interrupt(e)),
        }

        let group = match self.pid {
            Some(pid) => kill::terminate_tree(pid).await,
            None => Ok(()),
        };

        if let Err(e) = child.start_kill() {
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(Error::Interrupt(e));
            }
        }

        match tokio::time::timeout(TERMINATE_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => {
                // The group was already killed above.
                self.exit_status = Some(status);
                tracing::debug!(pid = ?self.pid, %status, "claude process terminated");
            }
            Ok(Err(e)) => return Err(Error::Interrupt(e)),
            Err(_) => {
                return Err(Error::Interrupt(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("process did not exit within {TERMINATE_TIMEOUT:?} of kill"),
                )))
            }
        }

        group.map_err(Error::Interrupt)
    }

    /// Terminate if still running, then release all handles.
    ///
    /// Safe to call more than once. Termination failures are logged, not
    /// returned, so cleanup never masks the error that led to it.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Err(e) = self.terminate().await {
            tracing::warn!(pid = ?self.pid, error = %e, "failed to terminate claude process during dispose");
        }

        self.writer = None;
        self.reader = None;
        if let Some(mut stderr) = self.stderr.take() {
            stderr.abort();
        }
        self.child = None;
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if self.exit_status.is_some() {
            return;
        }
        if let (Some(child), Some(pid)) = (self.child.as_mut(), self.pid) {
            match child.try_wait() {
                Ok(None) => {
                    let _ = kill::signal_group(pid);
                    let _ = child.start_kill();
                }
                Ok(Some(_)) => {
                    let _ = kill::signal_group(pid);
                }
                Err(_) => {}
            }
        }
    }
}

fn exit_error(program: String, status: ExitStatus, stderr: String) -> Error {
    Error::ProcessStart {
        program,
        stderr: Some(stderr).filter(|t| !t.trim().is_empty()),
        source: std::io::Error::other(format!("exited with {status}")),
    }
}
