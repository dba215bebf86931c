//! The blocking dispatcher: send-and-wait, with atomic multi-command batches.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;

use crate::config::ClientConfig;
use crate::discovery;
use crate::discovery::TargetInfo;
use crate::discovery::Version;
use crate::dispatch::DispatchChannels;
use crate::dispatch::Shared;
use crate::dispatch::Waiter;
use crate::dispatch::lock_or_recover;
use crate::dispatch::spawn_dispatch_loop;
use crate::error::ClientError;
use crate::message::Command;
use crate::message::CommandReply;
use crate::message::CommandResult;
use crate::message::encode_command;
use crate::transport;
use crate::transport::FrameReader;
use crate::transport::FrameWriter;

/// A debugger connection whose calls block until the remote side replies.
///
/// Only one blocking call, single or batch, may be in flight at a time on a
/// connection; calls from other threads queue behind it. Results and errors
/// are returned from the call itself; only remote-issued commands are
/// channel-delivered.
///
/// There is no deadline mechanism: a call blocks until its replies arrive or
/// the connection terminates. Callers needing bounded latency must wrap these
/// calls externally.
pub struct SyncDebugger {
    host: Option<String>,
    config: ClientConfig,
    shared: Arc<Shared>,
    call_lock: Mutex<()>,
    commands: Receiver<Command>,
}

impl SyncDebugger {
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
        let (commands_tx, commands_rx) = mpsc::sync_channel(config.channel_capacity);

        spawn_dispatch_loop(
            Box::new(reader),
            Arc::clone(&shared),
            DispatchChannels {
                commands: commands_tx,
                results: None,
                errors: None,
            },
        )
        .map_err(|e| ClientError::Connect(format!("failed to spawn dispatch thread: {}", e)))?;

        Ok(Self {
            host: None,
            config,
            shared,
            call_lock: Mutex::new(()),
            commands: commands_rx,
        })
    }

    /// Sends one command and blocks until its reply arrives.
    ///
    /// A remote-reported failure returns [`ClientError::Command`], enriched
    /// with the causing command. A transport write failure returns
    /// [`ClientError::SendFailed`] without ever blocking.
    pub fn send(&self, command: Command) -> Result<CommandResult, ClientError> {
        let _call = lock_or_recover(&self.call_lock);
        let (tx, rx) = mpsc::sync_channel(1);

        {
            let mut outbound = lock_or_recover(&self.shared.outbound);
            let id = outbound.session.assign();
            let frame = encode_command(id, &command)?;
            outbound.session.record(id, command);
            *lock_or_recover(&self.shared.waiter) = Some(Waiter {
                first_id: id,
                expected: 1,
                tx,
            });
            if let Err(e) = outbound.writer.write_frame(&frame) {
                self.shared.clear_waiter();
                return Err(ClientError::SendFailed(e));
            }
        }

        if self.shared.is_closed() {
            self.shared.clear_waiter();
            return Err(ClientError::ConnectionClosed);
        }

        let reply = rx.recv();
        self.shared.clear_waiter();
        match reply {
            Ok(CommandReply::Result(result)) => Ok(result),
            Ok(CommandReply::Error(error)) => Err(ClientError::Command(error)),
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    /// Sends an ordered batch and blocks until every reply has arrived.
    ///
    /// The whole batch occupies one contiguous identifier run; no other
    /// send or batch can interleave into it. Replies are returned in request
    /// order, not arrival order. If any frame write fails mid-batch the call
    /// aborts with [`ClientError::SendFailed`] for the whole batch.
    pub fn batch(&self, commands: Vec<Command>) -> Result<Vec<CommandReply>, ClientError> {
        let _call = lock_or_recover(&self.call_lock);
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        let expected = commands.len();
        let (tx, rx) = mpsc::sync_channel(expected);

        let first_id;
        {
            let mut outbound = lock_or_recover(&self.shared.outbound);
            first_id = outbound.session.reserve(expected as u64);
            *lock_or_recover(&self.shared.waiter) = Some(Waiter {
                first_id,
                expected,
                tx,
            });

            for (index, command) in commands.into_iter().enumerate() {
                let id = first_id + index as u64;
                let frame = match encode_command(id, &command) {
                    Ok(frame) => frame,
                    Err(e) => {
                        self.shared.clear_waiter();
                        return Err(e);
                    }
                };
                outbound.session.record(id, command);
                if let Err(e) = outbound.writer.write_frame(&frame) {
                    // a partially sent batch reports as fully failed; replies
                    // for frames that did go out are discarded with the waiter
                    self.shared.clear_waiter();
                    return Err(ClientError::SendFailed(e));
                }
            }
        }

        if self.shared.is_closed() {
            self.shared.clear_waiter();
            return Err(ClientError::ConnectionClosed);
        }

        let mut slots: Vec<Option<CommandReply>> = (0..expected).map(|_| None).collect();
        let mut filled = 0;
        while filled < expected {
            let reply = match rx.recv() {
                Ok(reply) => reply,
                Err(_) => {
                    self.shared.clear_waiter();
                    return Err(ClientError::ConnectionClosed);
                }
            };
            let index = (reply.id() - first_id) as usize;
            if slots[index].is_none() {
                filled += 1;
            }
            slots[index] = Some(reply);
        }
        self.shared.clear_waiter();

        Ok(slots.into_iter().flatten().collect())
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
