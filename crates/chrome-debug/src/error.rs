use thiserror::Error;

use crate::message::CommandError;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("discovery request failed: {0}")]
    Discovery(#[from] reqwest::Error),

    #[error("expected exactly {expected} debuggable target, found {found}")]
    DiscoveryMismatch { expected: usize, found: usize },

    #[error("no discovery host: connection was not established via connect()")]
    NoDiscoveryHost,

    #[error("websocket connect failed: {0}")]
    Connect(String),

    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to send command: {0}")]
    SendFailed(#[source] TransportError),

    #[error("inbound frame matches no known message shape: {raw}")]
    MalformedFrame { raw: String },

    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    #[error(transparent)]
    Command(#[from] CommandError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ErrorDetail;

    #[test]
    fn test_discovery_mismatch_display() {
        let err = ClientError::DiscoveryMismatch {
            expected: 1,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "expected exactly 1 debuggable target, found 3"
        );
    }

    #[test]
    fn test_command_error_is_transparent() {
        let err = ClientError::Command(CommandError {
            id: 4,
            error: ErrorDetail {
                code: -32601,
                message: "Method not found".to_string(),
            },
            request: None,
        });
        assert_eq!(
            err.to_string(),
            "request 4 failed with code '-32601': Method not found"
        );
    }

    #[test]
    fn test_send_failed_display() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err = ClientError::SendFailed(TransportError::Io(io));
        assert!(err.to_string().starts_with("failed to send command"));
    }
}
