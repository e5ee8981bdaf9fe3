// src/hardware/transport.rs - Line framing over a byte stream
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Carriage return, used by the stage controller.
pub const STAGE_TERMINATOR: u8 = b'\r';
/// Line feed, used by the pulsed laser controller.
pub const LASER_TERMINATOR: u8 = b'\n';

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: std::io::Error,
    },
}

/// One command per line in, one reply per line out.
#[async_trait]
pub trait Link: Send {
    /// Write `text` followed by the link's terminator.
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Read one reply with the terminator stripped.
    ///
    /// A closed or silent stream ends the line early; whatever was accumulated
    /// so far is returned, possibly empty.
    async fn receive(&mut self) -> Result<String, TransportError>;
}

/// A link shared by every task that talks to the same device.
///
/// Holding the lock across a send and its receive keeps a query and its reply
/// together when the poller and a motion task interleave.
pub type SharedLink = Arc<Mutex<Box<dyn Link>>>;

pub fn shared<L: Link + 'static>(link: L) -> SharedLink {
    Arc::new(Mutex::new(Box::new(link)))
}

/// Frames lines over any tokio byte stream, reading one byte at a time.
pub struct LineTransport<S> {
    stream: S,
    terminator: u8,
    read_timeout: Option<Duration>,
    label: &'static str,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, terminator: u8) -> Self {
        Self {
            stream,
            terminator,
            read_timeout: None,
            label: "serial",
        }
    }

    /// Treat a byte that does not arrive within `read_timeout` as end of data.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = Some(read_timeout);
        self
    }

    /// Name used in trace output.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        let mut byte = [0u8; 1];
        let n = match self.read_timeout {
            Some(limit) => match timeout(limit, self.stream.read(&mut byte)).await {
                Ok(result) => result?,
                Err(_) => {
                    tracing::trace!("{} read timed out", self.label);
                    return Ok(None);
                }
            },
            None => self.stream.read(&mut byte).await?,
        };
        Ok(if n == 0 { None } else { Some(byte[0]) })
    }
}

#[async_trait]
impl<S> Link for LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(self.terminator);
        tracing::debug!("{} TX: {}", self.label, text);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String, TransportError> {
        let mut line = Vec::new();
        while let Some(byte) = self.read_byte().await? {
            if byte == self.terminator {
                break;
            }
            line.push(byte);
        }
        let terminator = char::from(self.terminator);
        let text = String::from_utf8_lossy(&line)
            .trim_matches(terminator)
            .to_string();
        tracing::debug!("{} RX: {}", self.label, text);
        Ok(text)
    }
}
