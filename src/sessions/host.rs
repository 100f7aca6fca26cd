//! Registration and readiness brokering for remote participants.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::cup::{Client, PlayerDefinition};
use crate::error::CupError;
use crate::messages::Message;
use crate::routing::MessageSink;
use crate::sessions::controller::CupController;
use crate::{ClientId, RemoteClient};

/// Maps cup client ids to the transport handles that registered them.
///
/// One handle may register several clients (split-screen players on one machine).
/// Registration replies go to the requesting participant only. Everything else the
/// host triggers goes through the controller, which broadcasts.
#[derive(Debug, Clone, Default)]
pub struct RegistrationHost {
    owners: BTreeMap<ClientId, RemoteClient>,
}

impl RegistrationHost {
    /// Creates a host with no known participants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The clients a handle registered, in id order.
    #[must_use]
    pub fn clients_of(&self, from: RemoteClient) -> Vec<ClientId> {
        self.owners
            .iter()
            .filter_map(|(id, owner)| (*owner == from).then_some(*id))
            .collect()
    }

    /// Returns `true` if `client` was registered through `from`.
    #[must_use]
    pub fn owns(&self, from: RemoteClient, client: ClientId) -> bool {
        self.owners.get(&client) == Some(&from)
    }

    /// The handle a client registered from, if any.
    #[must_use]
    pub fn handle_for(&self, client: ClientId) -> Option<RemoteClient> {
        self.owners.get(&client).copied()
    }

    /// Registers `players` for the participant behind `from`.
    ///
    /// On success `from` receives `RegistrationSuccess`. On a capacity or window
    /// rejection it receives `ServerFull` with the reason and the cup is unchanged.
    pub fn register_client(
        &mut self,
        controller: &mut CupController,
        from: RemoteClient,
        players: Vec<PlayerDefinition>,
        sink: &mut dyn MessageSink,
    ) -> Result<ClientId, CupError> {
        match controller.register_client(players) {
            Ok(client_id) => {
                let client_key = controller.draw_client_key();
                self.owners.insert(client_id, from);
                sink.send(
                    Message::RegistrationSuccess {
                        client_id,
                        client_key,
                    },
                    from,
                );
                Ok(client_id)
            },
            Err(err) => {
                debug!(?from, error = %err, "registration rejected");
                if let Some(status) = err.registration_status() {
                    sink.send(Message::ServerFull { status }, from);
                }
                Err(err)
            },
        }
    }

    /// Unregisters a client and forgets its handle.
    pub fn unregister_client(
        &mut self,
        controller: &mut CupController,
        client: ClientId,
        sink: &mut dyn MessageSink,
    ) -> Result<Client, CupError> {
        let removed = controller.unregister_client(client, sink)?;
        self.owners.remove(&client);
        Ok(removed)
    }

    /// Marks every client registered through `from` ready. Unknown handles are ignored.
    pub fn handle_ready_signal(
        &self,
        controller: &mut CupController,
        from: RemoteClient,
        sink: &mut dyn MessageSink,
    ) {
        let clients = self.clients_of(from);
        if clients.is_empty() {
            trace!(?from, "ready signal from unregistered handle ignored");
        }
        for client in clients {
            controller.handle_ready(client, sink);
        }
    }

    /// Marks one client ready on behalf of `from`.
    ///
    /// The handle is authoritative: a `Ready` naming a client that `from` did not
    /// register is dropped.
    pub fn handle_ready(
        &self,
        controller: &mut CupController,
        from: RemoteClient,
        client: ClientId,
        sink: &mut dyn MessageSink,
    ) {
        if self.owns(from, client) {
            controller.handle_ready(client, sink);
        } else {
            trace!(?from, %client, "ready for a client not registered by this handle dropped");
        }
    }
}
