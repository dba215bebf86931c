//! Framed transport boundary and the websocket implementation.
//!
//! The dispatch engine only sees the [`FrameReader`] and [`FrameWriter`]
//! traits. The reader half is owned exclusively by the dispatch loop; the
//! writer half lives behind the shared send region. The websocket
//! implementation splits one connection into the two halves by cloning the
//! underlying TCP stream.

use std::net::TcpStream;

use thiserror::Error;
use tungstenite::Message;
use tungstenite::WebSocket;
use tungstenite::protocol::Role;
use tungstenite::stream::MaybeTlsStream;
use url::Url;

use crate::error::ClientError;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("connection closed")]
    Closed,
}

/// Blocking source of inbound frames. Sole property of the dispatch loop.
pub trait FrameReader: Send {
    /// Blocks until the next data frame arrives, or the connection closes.
    fn read_frame(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Sink for outbound frames, shared between dispatchers under a mutex.
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &str) -> Result<(), TransportError>;
}

#[derive(Debug)]
pub struct WebSocketReader {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

#[derive(Debug)]
pub struct WebSocketWriter {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

/// Dials the debugger endpoint and splits the connection into its reader and
/// writer halves.
///
/// Remote debugging endpoints are plain `ws://` addresses on the loopback
/// interface; TLS endpoints cannot be split this way and are rejected.
pub fn connect(endpoint: &str) -> Result<(WebSocketReader, WebSocketWriter), ClientError> {
    let parsed = Url::parse(endpoint)
        .map_err(|e| ClientError::Connect(format!("invalid endpoint {}: {}", endpoint, e)))?;
    if parsed.scheme() != "ws" {
        return Err(ClientError::Connect(format!(
            "unsupported endpoint scheme '{}': only ws:// debugger endpoints are supported",
            parsed.scheme()
        )));
    }

    let (socket, _response) = tungstenite::connect(endpoint)
        .map_err(|e| ClientError::Connect(e.to_string()))?;

    let write_stream = match socket.get_ref() {
        MaybeTlsStream::Plain(stream) => stream
            .try_clone()
            .map_err(|e| ClientError::Connect(format!("failed to clone stream: {}", e)))?,
        _ => {
            return Err(ClientError::Connect(
                "TLS debugger endpoints are not supported".to_string(),
            ));
        }
    };

    // The handshake already happened on the original socket; the writer half
    // is a second protocol state machine over the same TCP stream.
    let writer = WebSocket::from_raw_socket(MaybeTlsStream::Plain(write_stream), Role::Client, None);

    Ok((
        WebSocketReader { socket },
        WebSocketWriter { socket: writer },
    ))
}

impl FrameReader for WebSocketReader {
    fn read_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.socket.read() {
                Ok(Message::Text(text)) => return Ok(text.into_bytes()),
                Ok(Message::Binary(bytes)) => return Ok(bytes),
                Ok(Message::Close(_)) => return Err(TransportError::Closed),
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Err(TransportError::Closed);
                }
                Err(e) => return Err(TransportError::WebSocket(e)),
            }
        }
    }
}

impl FrameWriter for WebSocketWriter {
    fn write_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        match self.socket.send(Message::Text(frame.to_owned())) {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                Err(TransportError::Closed)
            }
            Err(e) => Err(TransportError::WebSocket(e)),
        }
    }
}
