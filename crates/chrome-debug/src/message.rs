//! Wire message types and the inbound frame classifier.
//!
//! A debugger connection carries three classes of inbound messages: errors
//! from failed commands, results from successful commands, and commands
//! created by the remote side (notifications). [`InboundMessage::decode`] is
//! the single place that decides which of the three a raw frame is.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::ClientError;

/// An outbound request before an identifier is assigned.
///
/// The same shape arrives inbound as an unsolicited notification from the
/// remote debugger, in which case it carries no identifier and is never
/// correlated to a local request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Command {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method)
    }
}

/// A successful completion of a dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: u64,
    #[serde(default)]
    pub result: Map<String, Value>,
    /// The request that caused this result, if the identifier was known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Command>,
}

/// A remote-reported failure of a dispatched command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandError {
    pub id: u64,
    pub error: ErrorDetail,
    /// The request that caused this error, if the identifier was known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i64,
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            Some(request) => write!(
                f,
                "request {} ({}) failed with code '{}': {}",
                self.id, request, self.error.code, self.error.message
            ),
            None => write!(
                f,
                "request {} failed with code '{}': {}",
                self.id, self.error.code, self.error.message
            ),
        }
    }
}

impl std::error::Error for CommandError {}

/// A single completion of a dispatched command: either outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Result(CommandResult),
    Error(CommandError),
}

impl CommandReply {
    pub fn id(&self) -> u64 {
        match self {
            Self::Result(result) => result.id,
            Self::Error(error) => error.id,
        }
    }

    pub fn into_result(self) -> Result<CommandResult, CommandError> {
        match self {
            Self::Result(result) => Ok(result),
            Self::Error(error) => Err(error),
        }
    }
}

/// One inbound frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Error(CommandError),
    Result(CommandResult),
    Command(Command),
}

impl InboundMessage {
    /// Classifies one raw frame into exactly one of the three message kinds.
    ///
    /// First match wins: a frame with an `error` field is an error even when
    /// it also carries an `id`; otherwise a frame with an `id` is a result;
    /// otherwise a frame with a `method` is a notification. Anything else
    /// fails with [`ClientError::MalformedFrame`] carrying the raw frame.
    pub fn decode(raw: &[u8]) -> Result<Self, ClientError> {
        let malformed = || ClientError::MalformedFrame {
            raw: String::from_utf8_lossy(raw).into_owned(),
        };

        let root: Value = serde_json::from_slice(raw).map_err(|_| malformed())?;
        let object = root.as_object().ok_or_else(malformed)?;

        if object.contains_key("error") {
            let error: CommandError =
                serde_json::from_value(root).map_err(|_| malformed())?;
            return Ok(Self::Error(error));
        }

        if object.contains_key("id") {
            let result: CommandResult =
                serde_json::from_value(root).map_err(|_| malformed())?;
            return Ok(Self::Result(result));
        }

        if object.contains_key("method") {
            let command: Command = serde_json::from_value(root).map_err(|_| malformed())?;
            return Ok(Self::Command(command));
        }

        Err(malformed())
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    id: u64,
    method: &'a str,
    params: &'a Map<String, Value>,
}

/// Encodes a dispatched command as a wire frame.
///
/// The identifier is injected here; it is never part of the caller-supplied
/// [`Command`].
pub(crate) fn encode_command(id: u64, command: &Command) -> Result<String, ClientError> {
    let frame = OutboundFrame {
        id,
        method: &command.method,
        params: &command.params,
    };
    Ok(serde_json::to_string(&frame)?)
}
