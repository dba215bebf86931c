//! The dispatch loop and the shared send region.
//!
//! Exactly one dispatch loop runs per connection. It is the sole reader of
//! the transport and the sole writer into the delivery channels and the
//! blocking-call waiter, so no inbound frame can be lost or routed twice.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc::SyncSender;
use std::thread;

use tracing::debug;
use tracing::warn;

use crate::error::ClientError;
use crate::message::Command;
use crate::message::CommandError;
use crate::message::CommandReply;
use crate::message::CommandResult;
use crate::message::InboundMessage;
use crate::message::encode_command;
use crate::session::SessionState;
use crate::transport::FrameReader;
use crate::transport::FrameWriter;
use crate::transport::TransportError;

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_or_recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| {
        warn!("recovering from poisoned lock");
        poisoned.into_inner()
    })
}

/// The outbound half of a connection. One mutex covers the identifier
/// counter, the correlation table, and the transport writer, so identifier
/// assignment and frame emission are indivisible.
pub(crate) struct Outbound {
    pub(crate) writer: Box<dyn FrameWriter>,
    pub(crate) session: SessionState,
}

/// A registered blocking call: the dispatch loop releases it by sending each
/// completion whose identifier falls in the call's reserved run.
///
/// The channel is created per call and sized to the expected completion
/// count, so only one blocking call can ever be outstanding against it.
pub(crate) struct Waiter {
    pub(crate) first_id: u64,
    pub(crate) expected: usize,
    pub(crate) tx: SyncSender<CommandReply>,
}

impl Waiter {
    fn covers(&self, id: u64) -> bool {
        id >= self.first_id && id - self.first_id < self.expected as u64
    }
}

/// State shared between the dispatchers and the dispatch loop.
pub(crate) struct Shared {
    pub(crate) outbound: Mutex<Outbound>,
    pub(crate) waiter: Mutex<Option<Waiter>>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new(writer: Box<dyn FrameWriter>) -> Self {
        Self {
            outbound: Mutex::new(Outbound {
                writer,
                session: SessionState::new(),
            }),
            waiter: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_waiter(&self) {
        *lock_or_recover(&self.waiter) = None;
    }

    /// Marks the connection terminated and abandons any registered waiter,
    /// waking the blocked caller. `closed` is set first: a caller that reads
    /// it as false is guaranteed its waiter will still be abandoned here.
    fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.clear_waiter();
    }
}

/// Where the dispatch loop delivers classified frames.
///
/// Results and errors are only channel-delivered in non-blocking mode; the
/// blocking dispatcher leaves them `None` and uncorrelated replies are
/// dropped. Notifications are always channel-delivered.
pub(crate) struct DispatchChannels {
    pub(crate) commands: SyncSender<Command>,
    pub(crate) results: Option<SyncSender<CommandResult>>,
    pub(crate) errors: Option<SyncSender<CommandError>>,
}

/// Assigns the next identifier, records the command for correlation, and
/// writes the frame, all under the caller-held outbound lock.
pub(crate) fn write_command(
    outbound: &mut Outbound,
    command: Command,
) -> Result<u64, ClientError> {
    let id = outbound.session.assign();
    let frame = encode_command(id, &command)?;
    outbound.session.record(id, command);
    outbound
        .writer
        .write_frame(&frame)
        .map_err(ClientError::SendFailed)?;
    Ok(id)
}

pub(crate) fn spawn_dispatch_loop(
    mut reader: Box<dyn FrameReader>,
    shared: Arc<Shared>,
    channels: DispatchChannels,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("chrome-debug-dispatch".to_string())
        .spawn(move || {
            run_dispatch_loop(reader.as_mut(), &shared, &channels);
            shared.shutdown();
        })
}

fn run_dispatch_loop(
    reader: &mut dyn FrameReader,
    shared: &Shared,
    channels: &DispatchChannels,
) {
    loop {
        let raw = match reader.read_frame() {
            Ok(raw) => raw,
            Err(TransportError::Closed) => {
                debug!("transport closed, dispatch loop exiting");
                return;
            }
            Err(e) => {
                debug!(error = %e, "transport read failed, dispatch loop exiting");
                return;
            }
        };

        let message = match InboundMessage::decode(&raw) {
            Ok(message) => message,
            Err(e) => {
                // fatal to this frame only; correlation continues for frames
                // that do parse
                warn!(error = %e, "dropping malformed frame");
                continue;
            }
        };

        match message {
            InboundMessage::Error(mut error) => {
                error.request = completed_request(shared, error.id);
                route_reply(shared, channels, CommandReply::Error(error));
            }
            InboundMessage::Result(mut result) => {
                result.request = completed_request(shared, result.id);
                route_reply(shared, channels, CommandReply::Result(result));
            }
            InboundMessage::Command(command) => {
                // notifications are never correlated; always channel-delivered
                if channels.commands.send(command).is_err() {
                    debug!("notification receiver dropped, discarding");
                }
            }
        }
    }
}

/// Evicts the correlation entry for `id` and returns the causing command.
fn completed_request(shared: &Shared, id: u64) -> Option<Command> {
    lock_or_recover(&shared.outbound).session.complete(id)
}

fn route_reply(shared: &Shared, channels: &DispatchChannels, reply: CommandReply) {
    {
        let guard = lock_or_recover(&shared.waiter);
        if let Some(waiter) = guard.as_ref() {
            if waiter.covers(reply.id()) {
                // the channel is sized to the expected completion count; a
                // full channel means the remote sent a duplicate identifier
                if waiter.tx.try_send(reply).is_err() {
                    debug!("waiter gone or duplicate reply, discarding");
                }
                return;
            }
        }
    }

    match reply {
        CommandReply::Result(result) => match &channels.results {
            Some(results) => {
                if results.send(result).is_err() {
                    debug!("result receiver dropped, discarding");
                }
            }
            None => warn!(id = result.id, "dropping uncorrelated result in blocking mode"),
        },
        CommandReply::Error(error) => match &channels.errors {
            Some(errors) => {
                if errors.send(error).is_err() {
                    debug!("error receiver dropped, discarding");
                }
            }
            None => warn!(id = error.id, "dropping uncorrelated error in blocking mode"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct NullWriter;

    impl FrameWriter for NullWriter {
        fn write_frame(&mut self, _frame: &str) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn shared() -> Shared {
        Shared::new(Box::new(NullWriter))
    }

    #[test]
    fn test_waiter_covers_its_run_only() {
        let (tx, _rx) = mpsc::sync_channel(3);
        let waiter = Waiter {
            first_id: 5,
            expected: 3,
            tx,
        };
        assert!(!waiter.covers(4));
        assert!(waiter.covers(5));
        assert!(waiter.covers(7));
        assert!(!waiter.covers(8));
    }

    #[test]
    fn test_write_command_consumes_id_on_failure() {
        struct FailingWriter;
        impl FrameWriter for FailingWriter {
            fn write_frame(&mut self, _frame: &str) -> Result<(), TransportError> {
                Err(TransportError::Closed)
            }
        }

        let shared = Shared::new(Box::new(FailingWriter));
        let mut outbound = lock_or_recover(&shared.outbound);

        let err = write_command(&mut outbound, Command::new("Page.enable")).unwrap_err();
        assert!(matches!(err, ClientError::SendFailed(_)));

        // the failed send consumed identifier 1 and its correlation entry
        // stays recorded: a reply might already be in flight
        assert_eq!(outbound.session.assign(), 2);
        assert!(outbound.session.complete(1).is_some());
    }

    #[test]
    fn test_reply_with_waiter_bypasses_channels() {
        let shared = shared();
        let (waiter_tx, waiter_rx) = mpsc::sync_channel(1);
        *lock_or_recover(&shared.waiter) = Some(Waiter {
            first_id: 1,
            expected: 1,
            tx: waiter_tx,
        });

        let (results_tx, results_rx) = mpsc::sync_channel(1);
        let (errors_tx, _errors_rx) = mpsc::sync_channel(1);
        let (commands_tx, _commands_rx) = mpsc::sync_channel(1);
        let channels = DispatchChannels {
            commands: commands_tx,
            results: Some(results_tx),
            errors: Some(errors_tx),
        };

        let reply = CommandReply::Result(CommandResult {
            id: 1,
            result: serde_json::Map::new(),
            request: None,
        });
        route_reply(&shared, &channels, reply);

        assert_eq!(waiter_rx.recv().unwrap().id(), 1);
        assert!(results_rx.try_recv().is_err());
    }

    #[test]
    fn test_out_of_run_reply_goes_to_channels() {
        let shared = shared();
        let (waiter_tx, waiter_rx) = mpsc::sync_channel(1);
        *lock_or_recover(&shared.waiter) = Some(Waiter {
            first_id: 1,
            expected: 1,
            tx: waiter_tx,
        });

        let (results_tx, results_rx) = mpsc::sync_channel(1);
        let (errors_tx, _errors_rx) = mpsc::sync_channel(1);
        let (commands_tx, _commands_rx) = mpsc::sync_channel(1);
        let channels = DispatchChannels {
            commands: commands_tx,
            results: Some(results_tx),
            errors: Some(errors_tx),
        };

        let reply = CommandReply::Result(CommandResult {
            id: 9,
            result: serde_json::Map::new(),
            request: None,
        });
        route_reply(&shared, &channels, reply);

        assert_eq!(results_rx.recv().unwrap().id, 9);
        assert!(waiter_rx.try_recv().is_err());
    }
}
