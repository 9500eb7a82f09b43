//! Per-connection handler.
//!
//! A handler owns one accepted stream for its whole life: it reads a
//! message, hands it to the message hook, answers `lists` and `values`
//! queries, and closes the connection on disconnect, timeout or any
//! error. Nothing about a failure is ever sent back to the client.

use crate::config::{Config, Framing};
use crate::protocol::{self, Command, ParseError, Response};
use crate::source::{self, DataFiles};
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, trace};

/// Callback run for every decoded message before command dispatch.
pub trait MessageHook: Send + Sync {
    fn on_message(&self, peer: SocketAddr, message: &str);
}

/// Hook that does nothing.
pub struct NoopHook;

impl MessageHook for NoopHook {
    fn on_message(&self, _peer: SocketAddr, _message: &str) {}
}

/// Connection settings shared by every handler.
#[derive(Debug, Clone)]
pub struct Settings {
    pub read_timeout: Duration,
    pub buffer_size: usize,
    pub framing: Framing,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout,
            buffer_size: config.buffer_size,
            framing: config.framing,
        }
    }
}

/// Result of a single read attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// This many bytes were read
    Data(usize),
    /// Peer closed its side
    Disconnected,
    /// Nothing arrived within the read timeout
    TimedOut,
    Failed(io::Error),
}

impl ReadOutcome {
    /// `Some(n)` for data, `None` for a clean disconnect.
    fn into_data(self) -> Result<Option<usize>, HandlerError> {
        match self {
            ReadOutcome::Data(n) => Ok(Some(n)),
            ReadOutcome::Disconnected => Ok(None),
            ReadOutcome::TimedOut => Err(HandlerError::Timeout),
            ReadOutcome::Failed(e) => Err(HandlerError::Io(e)),
        }
    }
}

/// Connection-fatal errors
#[derive(Debug)]
pub enum HandlerError {
    /// Read or write exceeded the timeout
    Timeout,
    /// Socket error
    Io(io::Error),
    /// Message is not valid UTF-8
    Decode(std::str::Utf8Error),
    /// A data file could not be read
    DataSource(PathBuf, io::Error),
    /// Values index is not a digit
    InvalidIndex(char),
    /// Values index past the last segment
    IndexOutOfRange { index: usize, segments: usize },
    /// Unterminated line outgrew the read buffer
    LineTooLong(usize),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Timeout => write!(f, "Connection timed out"),
            HandlerError::Io(e) => write!(f, "I/O error: {}", e),
            HandlerError::Decode(e) => write!(f, "Message is not UTF-8: {}", e),
            HandlerError::DataSource(path, e) => {
                write!(f, "Failed to read '{}': {}", path.display(), e)
            }
            HandlerError::InvalidIndex(c) => write!(f, "Invalid segment index: {:?}", c),
            HandlerError::IndexOutOfRange { index, segments } => {
                write!(f, "Segment index {} out of range ({} segments)", index, segments)
            }
            HandlerError::LineTooLong(len) => write!(f, "Line too long: {} bytes", len),
        }
    }
}

impl std::error::Error for HandlerError {}

impl From<ParseError> for HandlerError {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::InvalidIndex(c) => HandlerError::InvalidIndex(c),
        }
    }
}

/// Why a handler stopped.
#[derive(Debug)]
pub enum CloseReason {
    Disconnected,
    Error(HandlerError),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Disconnected => write!(f, "client disconnected"),
            CloseReason::Error(e) => write!(f, "{}", e),
        }
    }
}

/// Serves one connection at a time; cheap to share between tasks.
pub struct Handler {
    settings: Settings,
    files: DataFiles,
    hook: Arc<dyn MessageHook>,
}

impl Handler {
    pub fn new(settings: Settings, files: DataFiles) -> Self {
        Self {
            settings,
            files,
            hook: Arc::new(NoopHook),
        }
    }

    /// Install a custom hook, then hand the handler to `Listener::from_parts`.
    #[allow(dead_code)]
    pub fn with_hook(mut self, hook: Arc<dyn MessageHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Serve `stream` until the peer disconnects or an error occurs.
    ///
    /// The stream is dropped, and so closed, before this returns.
    pub async fn run<S>(&self, mut stream: S, peer: SocketAddr) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = match self.settings.framing {
            Framing::Read => self.serve_reads(&mut stream, peer).await,
            Framing::Line => self.serve_lines(&mut stream, peer).await,
        };
        drop(stream);

        let reason = match result {
            Ok(()) => CloseReason::Disconnected,
            Err(e) => CloseReason::Error(e),
        };
        debug!(peer = %peer, reason = %reason, "Connection closed");
        reason
    }

    /// One read is one message.
    async fn serve_reads<S>(&self, stream: &mut S, peer: SocketAddr) -> Result<(), HandlerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = vec![0u8; self.settings.buffer_size];

        loop {
            let Some(n) = self.read_once(stream, &mut buffer).await.into_data()? else {
                return Ok(());
            };

            let message = std::str::from_utf8(&buffer[..n]).map_err(HandlerError::Decode)?;
            self.dispatch(stream, peer, message).await?;
        }
    }

    /// Messages are `\n`-terminated lines, possibly split or batched
    /// across reads.
    async fn serve_lines<S>(&self, stream: &mut S, peer: SocketAddr) -> Result<(), HandlerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let limit = self.settings.buffer_size;
        let mut chunk = vec![0u8; limit];
        let mut pending = BytesMut::with_capacity(limit);

        loop {
            let Some(n) = self.read_once(stream, &mut chunk).await.into_data()? else {
                if !pending.is_empty() {
                    trace!(peer = %peer, bytes = pending.len(), "Discarding unterminated line");
                }
                return Ok(());
            };
            pending.extend_from_slice(&chunk[..n]);

            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let line = pending.split_to(pos + 1);
                let message = std::str::from_utf8(&line).map_err(HandlerError::Decode)?;
                self.dispatch(stream, peer, message).await?;
            }

            if pending.len() > limit {
                return Err(HandlerError::LineTooLong(pending.len()));
            }
        }
    }

    async fn read_once<S>(&self, stream: &mut S, buffer: &mut [u8]) -> ReadOutcome
    where
        S: AsyncRead + Unpin,
    {
        match timeout(self.settings.read_timeout, stream.read(buffer)).await {
            Err(_) => ReadOutcome::TimedOut,
            Ok(Ok(0)) => ReadOutcome::Disconnected,
            Ok(Ok(n)) => ReadOutcome::Data(n),
            Ok(Err(e)) => ReadOutcome::Failed(e),
        }
    }

    /// Run the hook, then answer the message if it is a query.
    async fn dispatch<S>(
        &self,
        stream: &mut S,
        peer: SocketAddr,
        message: &str,
    ) -> Result<(), HandlerError>
    where
        S: AsyncWrite + Unpin,
    {
        self.hook.on_message(peer, message);

        let command = protocol::parse(message);
        trace!(peer = %peer, ?command, "Processing message");

        let response = match command {
            Command::Lists => {
                let content = self.files.lists().await.map_err(|e| {
                    HandlerError::DataSource(self.files.lists_path().to_path_buf(), e)
                })?;
                Response::line(&content)
            }
            Command::Values { index } => {
                let index = Command::segment_index(index)?;
                let content = self.files.values().await.map_err(|e| {
                    HandlerError::DataSource(self.files.values_path().to_path_buf(), e)
                })?;
                let segment = source::segment(&content, index).ok_or_else(|| {
                    HandlerError::IndexOutOfRange {
                        index,
                        segments: source::segment_count(&content),
                    }
                })?;
                Response::line(segment)
            }
            Command::Unknown => return Ok(()),
        };

        match timeout(self.settings.read_timeout, stream.write_all(&response)).await {
            Err(_) => Err(HandlerError::Timeout),
            Ok(result) => result.map_err(HandlerError::Io),
        }
    }
}
