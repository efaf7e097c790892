//! Process tree termination.
//!
//! The CLI starts helpers of its own (shells, MCP servers, language tools).
//! Killing only the direct child would orphan them, so termination always
//! targets the whole tree.

use std::io;

/// Kill `pid` and all of its descendants.
///
/// On unix the child is started as the leader of a new process group, so the
/// whole group is signalled with `SIGKILL`. A group that no longer exists is
/// not an error.
#[cfg(unix)]
pub(crate) async fn terminate_tree(pid: u32) -> io::Result<()> {
    signal_group(pid)
}

/// Kill `pid` and all of its descendants with `taskkill /T /F`.
#[cfg(windows)]
pub(crate) async fn terminate_tree(pid: u32) -> io::Result<()> {
    let status = tokio::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await?;
    // 128: no such process.
    if status.success() || status.code() == Some(128) {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("taskkill exited with {status}"),
        ))
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) async fn terminate_tree(_pid: u32) -> io::Result<()> {
    Ok(())
}

/// Synchronous best-effort group kill, usable from `Drop`.
#[cfg(unix)]
pub(crate) fn signal_group(pid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    if pgid <= 1 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to signal process group <= 1",
        ));
    }
    // SAFETY: killpg has no memory safety preconditions.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

#[cfg(not(unix))]
pub(crate) fn signal_group(_pid: u32) -> io::Result<()> {
    Ok(())
}
