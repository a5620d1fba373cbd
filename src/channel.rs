//! Byte-exact message channel between the central and one external
//!
//! The round engines only talk to a [`MessageChannel`]. [`StreamChannel`]
//! provides it over any tokio byte stream: TCP sockets in the binaries,
//! in-memory duplex pipes in tests.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::{Message, MESSAGE_SIZE};

/// A point-to-point channel carrying whole [`Message`] records
#[async_trait]
pub trait MessageChannel: Send {
    /// Human-readable name of the far end, used in errors and logs
    fn peer(&self) -> &str;

    /// Send one message, flushing it to the wire
    async fn send(&mut self, msg: Message) -> Result<()>;

    /// Block until one whole message has arrived
    async fn recv(&mut self) -> Result<Message>;
}

/// [`MessageChannel`] over a tokio byte stream
pub struct StreamChannel<S> {
    stream: S,
    peer: String,
}

impl<S> StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    /// Give back the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }
}

#[async_trait]
impl<S> MessageChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, msg: Message) -> Result<()> {
        let buf = msg.encode();
        self.stream
            .write_all(&buf)
            .await
            .map_err(|source| Error::ChannelSend {
                peer: self.peer.clone(),
                source,
            })?;
        self.stream.flush().await.map_err(|source| Error::ChannelSend {
            peer: self.peer.clone(),
            source,
        })?;
        trace!(peer = %self.peer, message = %msg, "Sent");
        Ok(())
    }

    async fn recv(&mut self) -> Result<Message> {
        let mut buf = [0u8; MESSAGE_SIZE];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(Error::channel_closed(self.peer.clone()));
            }
            Err(source) => {
                return Err(Error::ChannelRecv {
                    peer: self.peer.clone(),
                    source,
                });
            }
        }
        let msg = Message::decode(&buf);
        trace!(peer = %self.peer, message = %msg, "Received");
        Ok(msg)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
