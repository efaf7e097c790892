//! Message stream implementation.
//!
//! This module provides [`MessageStream`], which implements [`futures::Stream`]
//! to yield decoded [`Message`]s from a line source (normally the CLI stdout).

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use tokio::time::timeout as tokio_timeout;
use tokio_util::sync::CancellationToken;

use crate::process::LineSource;
use crate::protocol::{self, Message, ResultMessage, Usage};
use crate::{Error, Result};

/// A forward-only stream of messages from one exchange with the CLI.
///
/// The stream ends by itself when:
/// - a [`ResultMessage`] was yielded (it is always the last item),
/// - the source reached EOF,
/// - the cancellation token fired (nothing partial is yielded),
/// - a line failed to decode or parse (the error is the last item).
///
/// Blank lines are skipped. Only one line is buffered at a time.
///
/// # Cancellation
///
/// Cancelling, or dropping the stream, releases the source. For streams
/// returned by [`ClaudeClient`](crate::ClaudeClient) that means the
/// subprocess is killed.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
///
/// let mut stream = client.query("Hello").await?;
/// while let Some(message) = stream.next().await {
///     match message? {
///         Message::Assistant(a) => print!("{}", a.text()),
///         Message::Result(r) => println!("\nturns: {}", r.num_turns),
///         _ => {}
///     }
/// }
/// ```
pub struct MessageStream {
    inner: BoxStream<'static, Result<Message>>,
    cancel: CancellationToken,
}

struct Pump<S> {
    source: S,
    cancel: CancellationToken,
    finished: bool,
}

enum Step {
    Line(Result<Option<String>>),
    Cancelled,
}

impl<S: LineSource> Pump<S> {
    async fn next_message(&mut self) -> Option<Result<Message>> {
        if self.finished {
            return None;
        }
        loop {
            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                line = self.source.next_line() => Step::Line(line),
            };

            match step {
                Step::Cancelled => return self.finish("cancelled", None).await,
                Step::Line(Ok(None)) => return self.finish("eof", None).await,
                Step::Line(Ok(Some(line))) => match protocol::decode_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(message)) if message.is_result() => {
                        return self.finish("result", Some(Ok(message))).await;
                    }
                    Ok(Some(message)) => return Some(Ok(message)),
                    Err(e) => return self.finish("error", Some(Err(e))).await,
                },
                Step::Line(Err(e)) => return self.finish("error", Some(Err(e))).await,
            }
        }
    }

    async fn finish(
        &mut self,
        reason: &'static str,
        last: Option<Result<Message>>,
    ) -> Option<Result<Message>> {
        self.finished = true;
        tracing::debug!(reason, "message stream finished");
        self.source.close().await;
        last
    }
}

impl MessageStream {
    /// Pump messages out of `source` until a result, EOF, error or `cancel`.
    pub fn new<S>(source: S, cancel: CancellationToken) -> Self
    where
        S: LineSource + 'static,
    {
        let pump = Pump {
            source,
            cancel: cancel.clone(),
            finished: false,
        };
        let inner = stream::unfold(pump, |mut pump| async move {
            let item = pump.next_message().await?;
            Some((item, pump))
        })
        .boxed();
        Self { inner, cancel }
    }

    /// Stop the stream. The next poll returns `None`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The token that cancels this stream.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// End the stream right after the first [`ResultMessage`].
    pub fn until_result(self) -> Self {
        let inner = self
            .inner
            .scan(false, |done, item| {
                if *done {
                    return futures::future::ready(None);
                }
                *done = matches!(&item, Ok(m) if m.is_result());
                futures::future::ready(Some(item))
            })
            .boxed();
        Self {
            inner,
            cancel: self.cancel,
        }
    }

    /// Collect the concatenated assistant text.
    ///
    /// An error result is returned as [`Error::CliError`]; output that ends
    /// without any result is [`Error::MissingResult`].
    pub async fn collect_text(self) -> Result<String> {
        let response = self.collect_all().await?;
        let Some(result) = response.result.as_ref() else {
            return Err(Error::MissingResult);
        };
        if result.is_error {
            return Err(Error::CliError {
                message: result
                    .result
                    .clone()
                    .unwrap_or_else(|| format!("CLI reported {}", result.subtype)),
            });
        }
        Ok(response.text())
    }

    /// Collect every message until the stream ends.
    pub async fn collect_all(mut self) -> Result<CollectedResponse> {
        let mut response = CollectedResponse::default();
        let mut assistant_usage = Usage::default();

        while let Some(message) = self.next().await {
            let message = message?;
            if response.session_id.is_none() {
                response.session_id = message.session_id().map(str::to_string);
            }
            match &message {
                Message::Assistant(a) => {
                    if let Some(usage) = &a.usage {
                        assistant_usage.accumulate(usage);
                    }
                }
                Message::Result(r) => {
                    response.result = Some(r.clone());
                    response.cost_usd = r.total_cost_usd;
                }
                _ => {}
            }
            response.messages.push(message);
        }

        response.usage = response
            .result
            .as_ref()
            .and_then(|r| r.usage.clone())
            .unwrap_or(assistant_usage);
        Ok(response)
    }
}

impl Stream for MessageStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A collected response from a completed stream.
#[derive(Debug, Clone, Default)]
pub struct CollectedResponse {
    /// Session ID from the first message that carried one.
    pub session_id: Option<String>,
    /// All messages in order, including the result.
    pub messages: Vec<Message>,
    /// Final result message.
    pub result: Option<ResultMessage>,
    /// Usage from the result, or summed over assistant messages without one.
    pub usage: Usage,
    /// Total cost in USD.
    pub cost_usd: Option<f64>,
}

impl CollectedResponse {
    /// Check if the response was successful.
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.is_success())
    }

    /// Get the final text result from the result message.
    pub fn result_text(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.result.as_deref())
    }

    /// All assistant text concatenated.
    pub fn text(&self) -> String {
        self.messages
            .iter()
            .filter_map(Message::as_assistant)
            .map(|a| a.text())
            .collect()
    }
}

/// Run a future with a timeout.
///
/// Returns an error if the future doesn't complete within the specified duration.
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio_timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(duration)),
    }
}
