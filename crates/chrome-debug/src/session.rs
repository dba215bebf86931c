//! Identifier assignment and the in-flight command correlation table.

use std::collections::HashMap;

use crate::message::Command;

/// Per-connection dispatch state: the identifier counter and the table of
/// commands still awaiting a reply.
///
/// Callers hold the surrounding mutex while assigning identifiers and
/// recording commands, so assignment and insertion appear atomic to any
/// concurrent dispatcher.
pub(crate) struct SessionState {
    next_id: u64,
    inflight: HashMap<u64, Command>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            inflight: HashMap::new(),
        }
    }

    /// Consumes and returns the next identifier.
    ///
    /// Identifiers are never reused, even when the subsequent transport
    /// write fails; a reply for the failed send may already be in flight.
    pub(crate) fn assign(&mut self) -> u64 {
        self.reserve(1)
    }

    /// Reserves a contiguous run of `count` identifiers, returning the first.
    pub(crate) fn reserve(&mut self, count: u64) -> u64 {
        let first = self.next_id;
        self.next_id += count;
        first
    }

    /// Records a dispatched command for later correlation.
    pub(crate) fn record(&mut self, id: u64, command: Command) {
        self.inflight.insert(id, command);
    }

    /// Removes and returns the command that caused `id`, if it is known.
    ///
    /// Unknown identifiers are not an error: the remote side may send an
    /// identifier this client never issued.
    pub(crate) fn complete(&mut self, id: u64) -> Option<Command> {
        self.inflight.remove(&id)
    }

    #[cfg(test)]
    pub(crate) fn outstanding(&self) -> usize {
        self.inflight.len()
    }
}
