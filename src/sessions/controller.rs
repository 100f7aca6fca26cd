//! The cup state machine.
//!
//! | State             | Trigger             | Emits                                   | Next                  |
//! |-------------------|---------------------|-----------------------------------------|-----------------------|
//! | Registration      | `Advance`           | `Intermission` (or `CupEnd` if no track)| Intermission (or End) |
//! | Intermission      | `Advance`           | `PreInitialization`                     | PreInitialization     |
//! | PreInitialization | stage loaded        | `Initialization`                        | Initialization        |
//! | PreInitialization | stage load failed   | `StageLoadFailed`, `Intermission`       | Intermission          |
//! | Initialization    | everyone `Ready`    | `StageBegin`                            | Action                |
//! | Action            | `Advance`           | `StageEnd`, then `Intermission`/`CupEnd`| Intermission or End   |
//! | End               | `Advance`           | `Restart`                               | Registration          |
//!
//! Every message is applied to the controller's own [`Cup`] before it is handed to the
//! sink, through the same [`Cup::apply`] any other consumer uses.

use tracing::{debug, trace};

use crate::cup::{Client, Cup, PlayerDefinition};
use crate::error::CupError;
use crate::messages::{CarInstance, Message, StageDescription};
use crate::rng::{Pcg32, Rng};
use crate::routing::MessageSink;
use crate::sessions::readiness::ReadinessTable;
use crate::telemetry::{ViolationKind, ViolationSeverity};
use crate::{report_violation, CarInstanceId, CarMode, ClientId, CupState, RemoteClient};

/// Drives a [`Cup`] through its lifecycle.
#[derive(Debug, Clone)]
pub struct CupController {
    cup: Cup,
    readiness: ReadinessTable,
    description: Option<StageDescription>,
    rng: Pcg32,
}

impl CupController {
    /// Takes control of `cup`. `rng` supplies client keys and random car models.
    pub fn new(cup: Cup, rng: Pcg32) -> Self {
        Self {
            cup,
            readiness: ReadinessTable::new(),
            description: None,
            rng,
        }
    }

    /// The controlled cup.
    #[must_use]
    pub fn cup(&self) -> &Cup {
        &self.cup
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CupState {
        self.cup.state()
    }

    /// The readiness table.
    #[must_use]
    pub fn readiness(&self) -> &ReadinessTable {
        &self.readiness
    }

    /// The description of the stage being loaded or raced.
    #[must_use]
    pub fn stage_description(&self) -> Option<&StageDescription> {
        self.description.as_ref()
    }

    /// Handles `Advance`. Returns `true` if the cup moved.
    pub fn advance(&mut self, sink: &mut dyn MessageSink) -> bool {
        match self.cup.state() {
            CupState::Registration => {
                self.enter_stage_or_end(sink);
                true
            },
            CupState::Intermission => {
                let Some(description) = self.build_description() else {
                    // The current stage index ran past the track list.
                    self.emit(Message::CupEnd, sink);
                    return true;
                };
                self.readiness.reset();
                self.description = Some(description.clone());
                self.emit(
                    Message::PreInitialization {
                        stage_id: description.stage_id,
                        description,
                    },
                    sink,
                );
                true
            },
            CupState::Action => {
                let stage_id = self.cup.current_stage();
                self.description = None;
                self.emit(Message::StageEnd { stage_id }, sink);
                self.enter_stage_or_end(sink);
                true
            },
            CupState::End => {
                self.restart(sink);
                true
            },
            state @ (CupState::CarSelection
            | CupState::PreInitialization
            | CupState::Initialization) => {
                debug!(%state, "advance ignored while waiting");
                false
            },
        }
    }

    /// Emits `Restart` and returns the cup to stage 0 in Registration, from any state.
    pub fn restart(&mut self, sink: &mut dyn MessageSink) {
        self.description = None;
        self.readiness.reset();
        self.emit(Message::Restart, sink);
    }

    /// The stage finished loading.
    pub fn stage_loaded(&mut self, sink: &mut dyn MessageSink) {
        if self.cup.state() != CupState::PreInitialization {
            debug!(state = %self.cup.state(), "stage load completion ignored");
            return;
        }
        let stage_id = self.cup.current_stage();
        self.emit(Message::Initialization { stage_id }, sink);
        self.check_readiness(sink);
    }

    /// The stage could not be built. The cup returns to Intermission on the same stage.
    pub fn stage_load_failed(&mut self, sink: &mut dyn MessageSink) {
        if self.cup.state() != CupState::PreInitialization {
            debug!(state = %self.cup.state(), "stage load failure ignored");
            return;
        }
        let stage_id = self.cup.current_stage();
        self.description = None;
        self.emit(Message::StageLoadFailed { stage_id }, sink);
        self.enter_stage_or_end(sink);
    }

    /// Registers a client. See [`Cup::register_client`].
    pub fn register_client(&mut self, players: Vec<PlayerDefinition>) -> Result<ClientId, CupError> {
        self.cup.register_client(players)
    }

    /// Unregisters a client, clearing its readiness. In Initialization the barrier is
    /// re-checked: the departing client may have been the last one not ready.
    pub fn unregister_client(
        &mut self,
        client: ClientId,
        sink: &mut dyn MessageSink,
    ) -> Result<Client, CupError> {
        let removed = self.cup.unregister_client(client)?;
        self.readiness.clear(client);
        if self.cup.state() == CupState::Initialization {
            self.check_readiness(sink);
        }
        Ok(removed)
    }

    /// Handles `Ready` from a registered client. Only honored in Initialization.
    pub fn handle_ready(&mut self, client: ClientId, sink: &mut dyn MessageSink) {
        if self.cup.state() != CupState::Initialization {
            debug!(%client, state = %self.cup.state(), "ready signal outside initialization ignored");
            return;
        }
        if self.cup.client(client).is_none() {
            trace!(%client, "ready signal from unknown client ignored");
            return;
        }
        self.readiness.mark_ready(client);
        self.check_readiness(sink);
    }

    /// Draws a fresh client key.
    pub fn draw_client_key(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn check_readiness(&mut self, sink: &mut dyn MessageSink) {
        if self.readiness.all_ready(self.cup.clients().iter()) {
            let stage_id = self.cup.current_stage();
            self.emit(Message::StageBegin { stage_id }, sink);
        }
    }

    fn enter_stage_or_end(&mut self, sink: &mut dyn MessageSink) {
        let stage_id = self.cup.current_stage();
        match self.cup.current_track().cloned() {
            Some(track) => self.emit(Message::Intermission { stage_id, track }, sink),
            None => self.emit(Message::CupEnd, sink),
        }
    }

    fn build_description(&mut self) -> Option<StageDescription> {
        let Self { cup, rng, .. } = self;
        let track = cup.current_track()?.clone();
        let mut cars = Vec::with_capacity(cup.player_count());
        'clients: for client in cup.clients().iter() {
            for player in &client.players {
                let Ok(instance) = u16::try_from(cars.len()) else {
                    report_violation!(
                        ViolationSeverity::Error,
                        ViolationKind::Configuration,
                        "stage {} has more players than car instance ids; extra players left out",
                        cup.current_stage()
                    );
                    break 'clients;
                };
                cars.push(CarInstance {
                    instance_id: CarInstanceId::new(instance),
                    model_id: pick_model(cup.car_mode(), cup.cars().len(), player, rng),
                    controller_id: client.id,
                    slot_id: player.control_slot,
                    start_position: instance,
                    color_scheme: player.color_scheme,
                });
            }
        }
        Some(StageDescription {
            stage_id: cup.current_stage(),
            track,
            car_models: cup.cars().to_vec(),
            cars,
        })
    }

    fn emit(&mut self, message: Message, sink: &mut dyn MessageSink) {
        let before = self.cup.state();
        self.cup.apply(&message);
        debug!(
            kind = ?message.kind(),
            from = %before,
            to = %self.cup.state(),
            stage = %self.cup.current_stage(),
            "cup transition"
        );
        sink.send(message, RemoteClient::All);
    }
}

fn pick_model(mode: CarMode, available: usize, player: &PlayerDefinition, rng: &mut Pcg32) -> u16 {
    match mode {
        CarMode::Fixed => 0,
        CarMode::Random => u16::try_from(rng.gen_range_usize(0..available)).unwrap_or(0),
        CarMode::Free => player
            .preferred_car
            .filter(|&car| usize::from(car) < available)
            .unwrap_or(0),
    }
}
