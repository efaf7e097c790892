//! Process management for the Claude CLI.
//!
//! This module launches the CLI, moves lines through its pipes, and makes
//! sure the process and everything it spawned is gone afterwards.
//!
//! # Architecture
//!
//! ```text
//! claude-subprocess                     claude CLI
//! ┌────────────────┐                   ┌─────────────┐
//! │ ProcessWriter  │───stdin (NDJSON)─▶│             │──▶ helpers
//! │ ProcessReader  │◀──stdout (NDJSON)─│             │    (same process
//! │ StderrCollector│◀──stderr (logs)───│             │     group)
//! └────────────────┘                   └─────────────┘
//! ```
//!
//! # Protocol
//!
//! Both directions carry one JSON document per line. The reader frames lines
//! with a codec that keeps partial input buffered, so a read abandoned by
//! cancellation never splits a message.

mod io;
mod kill;
mod spawn;
mod version;

pub use io::{LineSource, ProcessReader, ProcessWriter, StderrCollector};
pub use spawn::{LaunchSpec, ProcessSession, TERMINATE_TIMEOUT};

pub(crate) use version::check_version_once;

/// Minimum CLI version required for full compatibility.
pub const MIN_CLI_VERSION: &str = "2.0.0";
