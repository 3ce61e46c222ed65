//! Push-channel transport.
//!
//! The live channel delivers JSON-encoded full report objects, one per
//! message. [`PushTransport`] is the object-safe seam the lifecycle
//! supervisor drives; [`HttpStreamTransport`] is the production
//! implementation over a long-lived HTTP response streamed as
//! newline-delimited JSON.
//!
//! Only the lifecycle supervisor opens or closes connections; nothing
//! else in the crate touches the transport directly.

use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::ClientError;
use crate::gateway::BoxFuture;

/// Factory for push-channel connections.
pub trait PushTransport: Send + Sync {
    /// Opens a connection to the push channel.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the channel cannot be reached;
    /// the supervisor retries after its reconnect delay.
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn PushConnection>, ClientError>>;
}

/// A live connection delivering one JSON message per call.
pub trait PushConnection: Send {
    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` when the server closes the stream cleanly.
    ///
    /// # Errors
    ///
    /// Returns a transport error on connection failure; the supervisor
    /// reconnects.
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, ClientError>>;
}

/// Production transport: a streamed HTTP GET whose body is
/// newline-delimited JSON report objects.
pub struct HttpStreamTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpStreamTransport {
    /// Creates a transport for the given push endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be
    /// built.
    pub fn new(url: impl Into<String>) -> Result<Self, ClientError> {
        // No overall request timeout: the response body is an unbounded
        // stream. Connect failures still error out of `send`.
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(concat!("roadbuzz-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn connect_inner(&self) -> Result<Box<dyn PushConnection>, ClientError> {
        debug!(url = %self.url, "opening push channel");
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let stream: std::pin::Pin<
            Box<dyn Stream<Item = Result<bytes::Bytes, ClientError>> + Send>,
        > = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ClientError::from)),
        );
        Ok(Box::new(LineFramedConnection::new(stream)))
    }
}

impl PushTransport for HttpStreamTransport {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn PushConnection>, ClientError>> {
        Box::pin(self.connect_inner())
    }
}

/// Upper bound on a single framed message. A report object is a few
/// hundred bytes; anything near this size is a broken or hostile
/// server, and letting the buffer grow past it would let one
/// connection exhaust host memory.
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Frames a byte stream into newline-delimited messages. Blank lines
/// (keep-alives) are skipped. A line longer than [`MAX_MESSAGE_BYTES`]
/// fails the connection.
struct LineFramedConnection<S> {
    stream: S,
    buffer: Vec<u8>,
    done: bool,
}

impl<S> LineFramedConnection<S>
where
    S: Stream<Item = Result<bytes::Bytes, ClientError>> + Send + Unpin,
{
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            done: false,
        }
    }

    fn take_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    async fn next_inner(&mut self) -> Result<Option<String>, ClientError> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.done {
                // Trailing unterminated data is delivered as a final
                // message; the decoder rejects it if it is partial JSON.
                let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
                self.buffer.clear();
                return Ok((!rest.is_empty()).then_some(rest));
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    self.buffer.extend_from_slice(&chunk);
                    if self.buffer.len() > MAX_MESSAGE_BYTES {
                        self.buffer.clear();
                        return Err(ClientError::Transport(format!(
                            "push message exceeds {MAX_MESSAGE_BYTES} bytes"
                        )));
                    }
                },
                Some(Err(error)) => return Err(error),
                None => self.done = true,
            }
        }
    }
}

impl<S> PushConnection for LineFramedConnection<S>
where
    S: Stream<Item = Result<bytes::Bytes, ClientError>> + Send + Unpin,
{
    fn next_message(&mut self) -> BoxFuture<'_, Result<Option<String>, ClientError>> {
        Box::pin(self.next_inner())
    }
}
