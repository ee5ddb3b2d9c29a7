//! WebSocket transport for remote sessions.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};

use super::session::{Connection, Frame, RemoteSession};

/// Joins sessions at `<url>/<session_id>`.
pub struct WsRemoteSession {
    base_url: String,
}

impl WsRemoteSession {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
        }
    }

    fn session_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.base_url, session_id)
    }
}

#[async_trait]
impl RemoteSession for WsRemoteSession {
    async fn connect(&self, session_id: &str) -> Result<Box<dyn Connection>> {
        let url = self.session_url(session_id);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", url, e)))?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Ping(data) => Message::Ping(data),
            Frame::Pong(data) => Message::Pong(data),
            Frame::Close => Message::Close(None),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| Error::Connection(format!("Failed to send frame: {}", e)))
    }

    async fn recv(&mut self) -> Option<Result<Frame>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => Frame::Text(text),
                    Err(_) => {
                        tracing::debug!("Ignoring non UTF-8 binary frame");
                        continue;
                    }
                },
                Ok(Message::Ping(data)) => Frame::Ping(data),
                Ok(Message::Pong(data)) => Frame::Pong(data),
                Ok(Message::Close(_)) => Frame::Close,
                Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(Error::Connection(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| Error::Connection(format!("Failed to close connection: {}", e)))
    }
}
