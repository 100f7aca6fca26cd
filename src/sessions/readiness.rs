//! The readiness barrier.

use crate::cup::Client;
use crate::{ClientId, MAX_CLIENT_COUNT};

/// One flag per possible client id.
///
/// Reset whenever a stage is (re)built, cleared for a client when it leaves.
#[derive(Clone, PartialEq, Eq)]
pub struct ReadinessTable {
    ready: [bool; MAX_CLIENT_COUNT],
}

impl Default for ReadinessTable {
    fn default() -> Self {
        Self {
            ready: [false; MAX_CLIENT_COUNT],
        }
    }
}

impl std::fmt::Debug for ReadinessTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready: Vec<usize> = (0..MAX_CLIENT_COUNT).filter(|&i| self.ready[i]).collect();
        f.debug_struct("ReadinessTable").field("ready", &ready).finish()
    }
}

impl ReadinessTable {
    /// Creates a table with nobody ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a client ready.
    pub fn mark_ready(&mut self, client: ClientId) {
        self.ready[client.as_usize()] = true;
    }

    /// Clears one client's flag.
    pub fn clear(&mut self, client: ClientId) {
        self.ready[client.as_usize()] = false;
    }

    /// Clears every flag.
    pub fn reset(&mut self) {
        self.ready = [false; MAX_CLIENT_COUNT];
    }

    /// Returns `true` if the client has signalled readiness.
    #[must_use]
    pub fn is_ready(&self, client: ClientId) -> bool {
        self.ready[client.as_usize()]
    }

    /// Returns `true` if every client that brought at least one player is ready.
    pub fn all_ready<'a>(&self, mut clients: impl Iterator<Item = &'a Client>) -> bool {
        clients.all(|client| client.players.is_empty() || self.is_ready(client.id))
    }
}
