//! Integration tests for the message pump and collectors using scripted lines.

mod common;

use std::sync::Arc;
use std::time::Duration;

use claude_subprocess::process::ProcessReader;
use claude_subprocess::protocol::{ContentBlock, Message, UserContent};
use claude_subprocess::stream::MessageStream;
use claude_subprocess::Error;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use common::{ScenarioBuilder, ScriptedLines};

#[tokio::test]
async fn yields_n_plus_one_items_then_ends() {
    let (source, probe) = ScenarioBuilder::new()
        .system_init()
        .text("one")
        .text("two")
        .success_result(Some("onetwo"))
        .text("never read")
        .text("never read either")
        .build();

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 4);
    assert!(items.iter().all(Result::is_ok));
    assert!(items[3].as_ref().unwrap().is_result());
    assert_eq!(probe.reads(), 4, "nothing read past the result");
    assert!(probe.closed());
}

#[tokio::test]
async fn blank_lines_are_skipped() {
    let (source, _) = ScenarioBuilder::new()
        .blank()
        .system_init()
        .blank()
        .raw("")
        .text("hi")
        .blank()
        .success_result(None)
        .build();

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;

    let kinds: Vec<_> = items.iter().map(|m| m.as_ref().unwrap().kind()).collect();
    assert_eq!(kinds, ["system", "assistant", "result"]);
}

#[tokio::test]
async fn malformed_line_is_fatal() {
    let (source, probe) = ScenarioBuilder::new()
        .system_init()
        .raw("{\"type\":\"assistant\",")
        .success_result(None)
        .build();

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 2);
    match &items[1] {
        Err(Error::Decode { line, .. }) => assert!(line.starts_with("{\"type\":\"assistant\"")),
        other => panic!("expected Decode error, got {other:?}"),
    }
    assert_eq!(probe.reads(), 2);
    assert!(probe.closed());
}

#[tokio::test]
async fn schema_violation_names_the_field() {
    let (source, _) = ScenarioBuilder::new()
        .raw(r#"{"type":"assistant","message":{}}"#)
        .success_result(None)
        .build();

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 1, "no partial assistant message, stream ends");
    match &items[0] {
        Err(Error::MessageParse {
            field, fragment, ..
        }) => {
            assert_eq!(field, "message.content");
            assert!(fragment.contains("assistant"));
        }
        other => panic!("expected MessageParse error, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_message_type_is_an_error() {
    let (source, _) = ScriptedLines::new([r#"{"type":"telemetry","session_id":"s"}"#]);
    let mut stream = MessageStream::new(source, CancellationToken::new());
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.is_protocol_error());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn source_error_ends_stream() {
    let (source, _) = ScenarioBuilder::new().system_init().build();
    let source = source.then_error(Error::io(std::io::Error::other("pipe broke")));

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert!(matches!(items[1], Err(Error::Io(_))));
}

#[tokio::test]
async fn result_example_ends_the_stream() {
    let line = r#"{"type":"result","subtype":"success","duration_ms":1200,"duration_api_ms":900,"is_error":false,"num_turns":2,"session_id":"abc","total_cost_usd":0.0021}"#;
    let (source, _) = ScriptedLines::new([line, line]);

    let items: Vec<_> = MessageStream::new(source, CancellationToken::new())
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    let Message::Result(result) = items[0].as_ref().unwrap() else {
        panic!("expected result message");
    };
    assert_eq!(result.num_turns, 2);
    assert!(!result.is_error);
    assert!((result.total_cost_usd.unwrap() - 0.0021).abs() < 1e-12);
    assert_eq!(result.duration(), Duration::from_millis(1200));
    assert_eq!(result.session_id, "abc");
}

#[tokio::test]
async fn tool_round_trip_is_typed() {
    let (source, _) = ScenarioBuilder::new()
        .system_init()
        .tool_use("toolu_1", "Bash", serde_json::json!({"command": "ls"}))
        .tool_result("toolu_1", "Cargo.toml\nsrc", false)
        .tool_result("toolu_2", "permission denied", true)
        .text("Done")
        .success_result(Some("Done"))
        .build();

    let response = MessageStream::new(source, CancellationToken::new())
        .collect_all()
        .await
        .unwrap();

    let tool_uses: Vec<_> = response
        .messages
        .iter()
        .filter_map(Message::as_assistant)
        .flat_map(|a| a.tool_uses())
        .collect();
    assert_eq!(tool_uses.len(), 1);
    assert_eq!(tool_uses[0].name, "Bash");

    let results: Vec<_> = response
        .messages
        .iter()
        .filter_map(Message::as_user)
        .flat_map(|u| u.tool_results())
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content_text(), "Cargo.toml\nsrc");
    assert!(results[1].is_error());

    // Well-formed error results stay tool results.
    let user = response.messages[3].as_user().unwrap();
    let UserContent::Blocks(blocks) = &user.content else {
        panic!("expected content blocks");
    };
    assert!(blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult(_))));

    assert_eq!(response.text(), "Done");
    assert_eq!(response.usage.input_tokens, 20);
}

#[tokio::test]
async fn error_result_surfaces_as_cli_error() {
    let (source, _) = ScenarioBuilder::new()
        .system_init()
        .error_result("error_max_turns")
        .build();

    let err = MessageStream::new(source, CancellationToken::new())
        .collect_text()
        .await
        .unwrap_err();
    match err {
        Error::CliError { message } => assert!(message.contains("error_max_turns")),
        other => panic!("expected CliError, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_mid_line_loses_nothing() {
    let (mut tx, rx) = tokio::io::duplex(1024);
    let reader = Arc::new(tokio::sync::Mutex::new(ProcessReader::new(rx)));

    tx.write_all(br#"{"type":"system","subtype":"init","session_id":"s1""#)
        .await
        .unwrap();

    let first_token = CancellationToken::new();
    let guard = Arc::clone(&reader).try_lock_owned().unwrap();
    let mut first = MessageStream::new(guard, first_token.clone());

    let pending = tokio::time::timeout(Duration::from_millis(50), first.next()).await;
    assert!(pending.is_err(), "half a line must not produce a message");

    first_token.cancel();
    assert!(first.next().await.is_none(), "cancelled stream yields nothing");
    drop(first);

    tx.write_all(b",\"uuid\":\"u1\"}\n").await.unwrap();

    let guard = Arc::clone(&reader).try_lock_owned().unwrap();
    let mut second = MessageStream::new(guard, CancellationToken::new());
    let message = second.next().await.unwrap().unwrap();
    assert!(message.is_system_init());
    assert_eq!(message.session_id(), Some("s1"));
    assert_eq!(message.uuid(), Some("u1"));
}

#[tokio::test]
async fn until_result_on_live_pipe() {
    let (mut tx, rx) = tokio::io::duplex(4096);
    let lines = ScenarioBuilder::new()
        .system_init()
        .text("streamed")
        .success_result(None)
        .lines();
    for line in &lines {
        tx.write_all(line.as_bytes()).await.unwrap();
        tx.write_all(b"\n").await.unwrap();
    }

    // The writer stays open: the stream must end on the result, not on EOF.
    let stream = MessageStream::new(ProcessReader::new(rx), CancellationToken::new());
    let text = tokio::time::timeout(Duration::from_secs(5), stream.until_result().collect_text())
        .await
        .expect("stream should end at the result")
        .unwrap();
    assert_eq!(text, "streamed");
    drop(tx);
}
