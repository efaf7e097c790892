//! Real-subprocess tests: a fake CLI written as a shell script.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use claude_subprocess::process::{LaunchSpec, ProcessSession};
use claude_subprocess::{ClaudeClient, Error, Message, SessionState};
use futures::StreamExt;
use serde_json::json;

/// Answers every input line with one assistant message and one result.
/// The assistant text echoes the entrypoint variable.
const ECHO_CLI: &str = r#"#!/bin/sh
if [ "$1" = "-v" ]; then echo "2.1.0 (Claude Code)"; exit 0; fi
echo '{"type":"system","subtype":"init","session_id":"fake","uuid":"u0","model":"fake-model"}'
while IFS= read -r line; do
  printf '{"type":"assistant","message":{"model":"fake-model","content":[{"type":"text","text":"pong:%s"}]},"session_id":"fake"}\n' "$CLAUDE_CODE_ENTRYPOINT"
  echo '{"type":"result","subtype":"success","duration_ms":3,"duration_api_ms":2,"is_error":false,"num_turns":1,"session_id":"fake","total_cost_usd":0.5,"usage":{"input_tokens":4,"output_tokens":2}}'
done
"#;

/// Starts a long sleeper and reports its PID.
const SPAWNING_CLI: &str = r#"#!/bin/sh
sleep 300 &
printf '{"type":"system","subtype":"init","session_id":"fake","sleeper":%s}\n' "$!"
wait
"#;

/// Exits right after the init line.
const SHORT_CLI: &str = r#"#!/bin/sh
echo '{"type":"system","subtype":"init","session_id":"fake"}'
"#;

/// Fails before producing any output.
const FAILING_CLI: &str = r#"#!/bin/sh
echo "error: invalid api key" >&2
exit 3
"#;

/// Writes invalid UTF-8 and more than a pipe buffer to stderr, then answers.
const NOISY_STDERR_CLI: &str = r#"#!/bin/sh
read -r line
printf 'bad \377 byte\n' >&2
head -c 200000 /dev/zero | tr '\0' x >&2
echo >&2
echo '{"type":"result","subtype":"success","duration_ms":3,"duration_api_ms":2,"is_error":false,"num_turns":1,"session_id":"fake","result":"done"}'
"#;

fn write_cli(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("claude");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn client_for(cli: &Path) -> ClaudeClient {
    ClaudeClient::builder()
        .cli_path(cli)
        .version_check(false)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    if unsafe { libc::kill(pid, 0) } != 0 {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

async fn eventually_dead(pid: i32) -> bool {
    for _ in 0..100 {
        if !alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn one_shot_text_query() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), ECHO_CLI);
    let client = ClaudeClient::builder()
        .cli_path(&cli)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap();

    let response = client.query_collect("ping").await.unwrap();
    assert_eq!(response.messages.len(), 3);
    assert_eq!(response.text(), "pong:sdk-rust");
    assert_eq!(response.session_id.as_deref(), Some("fake"));
    assert_eq!(response.cost_usd, Some(0.5));
    assert!(response.is_success());
}

#[tokio::test]
async fn one_shot_streamed_requests() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), ECHO_CLI);
    let client = client_for(&cli);

    let requests = vec![json!({
        "type": "user",
        "message": {"role": "user", "content": "ping"},
        "parent_tool_use_id": null,
        "session_id": "mine",
    })];
    let text = client.query_text(requests).await.unwrap();
    assert_eq!(text, "pong:sdk-rust");
}

#[tokio::test]
async fn dropping_a_query_kills_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), SPAWNING_CLI);
    let client = client_for(&cli);

    let mut stream = client.query("ping").await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    let sleeper = first.as_system().unwrap().get("sleeper").unwrap().as_i64().unwrap() as i32;
    assert!(alive(sleeper));

    stream.cancel();
    assert!(stream.next().await.is_none());
    assert!(eventually_dead(sleeper).await, "sleeper {sleeper} survived cancel");
}

#[tokio::test]
async fn interactive_turns() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), ECHO_CLI);
    let mut session = client_for(&cli).session();

    session.connect().await.unwrap();
    assert_eq!(session.state(), SessionState::Connected);

    session.send("first", None).await.unwrap();
    let kinds: Vec<_> = session
        .receive_until_result()
        .unwrap()
        .map(|m| m.unwrap().kind())
        .collect()
        .await;
    assert_eq!(kinds, ["system", "assistant", "result"]);

    let second = session.send_and_collect("second").await.unwrap();
    assert_eq!(second.text(), "pong:sdk-rust");
    assert_eq!(session.session_id(), Some("fake"));
    assert_eq!(session.total_usage().input_tokens, 4);
    assert!((session.total_cost_usd() - 0.5).abs() < 1e-9);

    let pid = session.pid().unwrap() as i32;
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(eventually_dead(pid).await);
}

#[tokio::test]
async fn connect_twice_fails_consistently() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), ECHO_CLI);
    let mut session = client_for(&cli).session();

    session.connect().await.unwrap();
    for _ in 0..2 {
        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionState(_)));
        assert!(session.is_connected());
    }
    session.disconnect().await;
}

#[tokio::test]
async fn second_receive_view_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), ECHO_CLI);
    let mut session = client_for(&cli).session();
    session.connect().await.unwrap();

    let first = session.receive_all().unwrap();
    assert!(matches!(
        session.receive_all(),
        Err(Error::ConnectionState(_))
    ));
    drop(first);
    assert!(session.receive_all().is_ok());
    session.disconnect().await;
}

#[tokio::test]
async fn interrupt_kills_descendants() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), SPAWNING_CLI);
    let mut session = client_for(&cli).session();
    session.connect().await.unwrap();

    let mut view = session.receive_all().unwrap();
    let Some(Ok(Message::System(init))) = view.next().await else {
        panic!("expected init message");
    };
    let sleeper = init.get("sleeper").unwrap().as_i64().unwrap() as i32;
    assert!(alive(sleeper));

    session.interrupt().await.unwrap();
    assert!(eventually_dead(sleeper).await, "sleeper {sleeper} survived interrupt");
    assert!(view.next().await.is_none(), "view ends at EOF");

    // The wrapper is still usable for cleanup.
    assert!(session.is_connected());
    session.disconnect().await;
}

#[tokio::test]
async fn disconnect_after_cli_exited() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), SHORT_CLI);
    let mut session = client_for(&cli).session();
    session.connect().await.unwrap();
    let pid = session.pid().unwrap() as i32;

    let items: Vec<_> = session.receive_all().unwrap().collect().await;
    assert_eq!(items.len(), 1);

    session.disconnect().await;
    session.disconnect().await;
    assert!(eventually_dead(pid).await);
}

#[tokio::test]
async fn dispose_after_exit_leaves_nothing() {
    let spec = LaunchSpec::new("sh").args(["-c", "exit 0"]);
    let mut process = ProcessSession::spawn(&spec).await.unwrap();
    let pid = process.pid().unwrap() as i32;
    assert!(process.wait().await.unwrap().success());

    process.dispose().await;
    process.dispose().await;
    assert!(process.is_disposed());
    assert!(!alive(pid));
}

#[tokio::test]
async fn working_directory_and_env_reach_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(
        dir.path(),
        r#"#!/bin/sh
read -r line
printf '{"type":"system","subtype":"init","session_id":"fake","cwd":"%s","custom":"%s","home":"%s"}\n' "$(pwd -P)" "$CUSTOM" "${HOME:-unset}"
"#,
    );
    let work = tempfile::tempdir().unwrap();
    let client = ClaudeClient::builder()
        .cli_path(&cli)
        .version_check(false)
        .working_directory(work.path())
        .env("CUSTOM", "value")
        .remove_env("HOME")
        .build()
        .unwrap();

    let response = client.query_collect("ping").await.unwrap();
    let init = response.messages[0].as_system().unwrap();
    let expected = std::fs::canonicalize(work.path()).unwrap();
    assert_eq!(init.cwd(), expected.to_str());
    assert_eq!(init.get("custom").and_then(|v| v.as_str()), Some("value"));
    assert_eq!(init.get("home").and_then(|v| v.as_str()), Some("unset"));
}

#[tokio::test]
async fn failing_cli_always_reports_its_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), FAILING_CLI);
    let client = client_for(&cli);

    for _ in 0..5 {
        for err in [
            client.query_text("ping").await.unwrap_err(),
            client.query_collect("ping").await.unwrap_err(),
        ] {
            match err {
                Error::ProcessStart { stderr, .. } => {
                    assert_eq!(stderr.as_deref(), Some("error: invalid api key\n"));
                }
                other => panic!("expected ProcessStart, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn invalid_utf8_on_stderr_does_not_stall_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_cli(dir.path(), NOISY_STDERR_CLI);
    let client = client_for(&cli);

    let response = client.query_collect("ping").await.unwrap();
    assert!(response.is_success());
    assert_eq!(response.result_text(), Some("done"));
}
