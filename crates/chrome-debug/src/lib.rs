//! Client for the Chrome DevTools remote debugging protocol.
//!
//! Remote debugging is asynchronous: a single websocket connection carries
//! errors from failed commands, results from successful commands, and
//! commands created by the remote debugger. [`AsyncDebugger`] exposes all
//! three as channels and never blocks on a reply; [`SyncDebugger`] blocks
//! each call until its reply arrives and supports atomic multi-command
//! batches. Both demultiplex the same inbound stream and correlate replies
//! back to the commands that caused them.

#![deny(clippy::all)]

mod async_debugger;
mod config;
pub mod discovery;
mod dispatch;
mod error;
mod message;
mod mock;
mod session;
mod sync_debugger;
pub mod transport;

pub use async_debugger::AsyncDebugger;
pub use async_debugger::CommandSender;
pub use config::ClientConfig;
pub use discovery::TargetInfo;
pub use discovery::Version;
pub use error::ClientError;
pub use message::Command;
pub use message::CommandError;
pub use message::CommandReply;
pub use message::CommandResult;
pub use message::ErrorDetail;
pub use message::InboundMessage;
pub use mock::MockReader;
pub use mock::MockRemote;
pub use mock::MockTransport;
pub use mock::MockWriter;
pub use sync_debugger::SyncDebugger;
pub use transport::FrameReader;
pub use transport::FrameWriter;
pub use transport::TransportError;

pub type Result<T> = std::result::Result<T, ClientError>;
