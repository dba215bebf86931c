//! The non-blocking dispatcher: fire commands, collect replies later.

use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;

use crate::config::ClientConfig;
use crate::discovery;
use crate::discovery::TargetInfo;
use crate::discovery::Version;
use crate::dispatch::DispatchChannels;
use crate::dispatch::Shared;
use crate::dispatch::lock_or_recover;
use crate::dispatch::spawn_dispatch_loop;
use crate::dispatch::write_command;
use crate::error::ClientError;
use crate::message::Command;
use crate::message::CommandError;
use crate::message::CommandResult;
use crate::transport;
use crate::transport::FrameReader;
use crate::transport::FrameWriter;

/// A debugger connection whose `send` never waits for a reply.
///
/// Replies arrive later on three independently drainable channels: results,
/// errors, and commands issued by the remote side. Replies interleave in
/// arrival order, not issuance order. Channels must be drained promptly; a
/// full channel stalls all inbound traffic for the connection.
pub struct AsyncDebugger {
    host: Option<String>,
    config: ClientConfig,
    shared: Arc<Shared>,
    results: Receiver<CommandResult>,
    errors: Receiver<CommandError>,
    commands: Receiver<Command>,
}

impl AsyncDebugger {
    /// Discovers the single debuggable target at `host` and connects to it.
    pub fn connect(host: &str) -> Result<Self, ClientError> {
        Self::connect_with(host, ClientConfig::default())
    }

    pub fn connect_with(host: &str, config: ClientConfig) -> Result<Self, ClientError> {
        let target = discovery::single_target(host, config.http_timeout)?;
        let (reader, writer) = transport::connect(&target.websocket_debugger_url)?;
        let mut debugger = Self::over(reader, writer, config)?;
        debugger.host = Some(host.to_string());
        Ok(debugger)
    }

    /// Builds a debugger over an already-established transport.
    pub fn over(
        reader: impl FrameReader + 'static,
        writer: impl FrameWriter + 'static,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let shared = Arc::new(Shared::new(Box::new(writer)));
        let (results_tx, results_rx) = mpsc::sync_channel(config.channel_capacity);
        let (errors_tx, errors_rx) = mpsc::sync_channel(config.channel_capacity);
        let (commands_tx, commands_rx) = mpsc::sync_channel(config.channel_capacity);

        spawn_dispatch_loop(
            Box::new(reader),
            Arc::clone(&shared),
            DispatchChannels {
                commands: commands_tx,
                results: Some(results_tx),
                errors: Some(errors_tx),
            },
        )
        .map_err(|e| ClientError::Connect(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self {
            host: None,
            config,
            shared,
            results: results_rx,
            errors: errors_rx,
            commands: commands_rx,
        })
    }

    /// Sends a command and returns its assigned identifier immediately.
    ///
    /// A transport write failure still consumes the identifier; it is never
    /// reused, so a reply already in flight stays unambiguous.
    pub fn send(&self, command: Command) -> Result<u64, ClientError> {
        let mut outbound = lock_or_recover(&self.shared.outbound);
        write_command(&mut outbound, command)
    }

    /// Returns a cloneable handle for sending from other threads.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Results of commands this client sent, in arrival order.
    pub fn results(&self) -> &Receiver<CommandResult> {
        &self.results
    }

    /// Failures of commands this client sent, in arrival order.
    pub fn errors(&self) -> &Receiver<CommandError> {
        &self.errors
    }

    /// Commands issued by the remote debugger.
    pub fn commands(&self) -> &Receiver<Command> {
        &self.commands
    }

    /// Browser build information from the discovery sidecar.
    pub fn version(&self) -> Result<Version, ClientError> {
        let host = self.host.as_deref().ok_or(ClientError::NoDiscoveryHost)?;
        discovery::version(host, self.config.http_timeout)
    }

    /// Debuggable targets listed by the discovery sidecar.
    pub fn targets(&self) -> Result<Vec<TargetInfo>, ClientError> {
        let host = self.host.as_deref().ok_or(ClientError::NoDiscoveryHost)?;
        discovery::targets(host, self.config.http_timeout)
    }
}

/// A cheap handle that can send commands on a shared connection.
#[derive(Clone)]
pub struct CommandSender {
    shared: Arc<Shared>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<u64, ClientError> {
        let mut outbound = lock_or_recover(&self.shared.outbound);
        write_command(&mut outbound, command)
    }
}
