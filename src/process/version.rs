//! Best-effort CLI version probe.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Command;

use super::MIN_CLI_VERSION;

/// Version check state. We only check once per process.
static VERSION_CHECKED: AtomicBool = AtomicBool::new(false);

/// How long `claude -v` may take before the probe is abandoned.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Check the CLI version once per process, warning when it is outdated.
///
/// Failures are logged at debug level and never block a launch; the real
/// launch reports a missing binary with a proper error.
pub(crate) async fn check_version_once(program: &Path) {
    if VERSION_CHECKED.swap(true, Ordering::SeqCst) {
        return;
    }
    check_cli_version(program).await;
}

async fn check_cli_version(program: &Path) {
    let probe = Command::new(program)
        .arg("-v")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::debug!(program = %program.display(), error = %e, "CLI version check failed");
            return;
        }
        Err(_) => {
            tracing::debug!(program = %program.display(), "CLI version check timed out");
            return;
        }
    };

    if !output.status.success() {
        tracing::debug!(status = %output.status, "claude -v returned non-zero exit code");
        return;
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    match parse_version(&version_str) {
        Some(version) if version_below_min(&version) => {
            tracing::warn!(
                "Claude CLI version {} is below minimum recommended version {}. \
                 Some features may not work correctly.",
                version_str.trim(),
                MIN_CLI_VERSION
            );
        }
        Some(_) => tracing::debug!("Claude CLI version: {}", version_str.trim()),
        None => tracing::debug!("Could not parse CLI version from: {}", version_str.trim()),
    }
}

/// Parse a version string like "2.0.76 (Claude Code)" into (major, minor, patch).
pub(crate) fn parse_version(s: &str) -> Option<(u32, u32, u32)> {
    s.split_whitespace().find_map(|word| {
        let word = word.strip_prefix('v').unwrap_or(word);
        let mut parts = word.split('.');
        let mut next = || -> Option<u32> {
            let digits: String = parts
                .next()?
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().ok()
        };
        Some((next()?, next()?, next()?))
    })
}

/// Check if a version is below the minimum required.
pub(crate) fn version_below_min(version: &(u32, u32, u32)) -> bool {
    let min = parse_version(MIN_CLI_VERSION).unwrap_or((2, 0, 0));
    *version < min
}
