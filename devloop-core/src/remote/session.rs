//! Traits for remote session connections.

use async_trait::async_trait;

use crate::error::Result;

/// A frame on a remote session connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// One live duplex connection to a remote session.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Receives the next frame.
    ///
    /// `None` means the connection is closed. An `Err` reports a connection
    /// error; the connection may still be usable afterwards.
    async fn recv(&mut self) -> Option<Result<Frame>>;

    async fn close(&mut self) -> Result<()>;
}

/// Capability to join a remote collaboration session.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn connect(&self, session_id: &str) -> Result<Box<dyn Connection>>;
}
