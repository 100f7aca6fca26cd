//! The shell-facing session facade.

use std::fmt;

use tracing::{debug, info, trace};

use crate::cup::{Client, Cup, PlayerDefinition};
use crate::error::CupError;
use crate::messages::{ControlsMask, Message};
use crate::routing::MessageSink;
use crate::sessions::controller::CupController;
use crate::sessions::host::RegistrationHost;
use crate::sessions::readiness::ReadinessTable;
use crate::stage::loader::{LoadError, LoadHandle, StageLoader};
use crate::stage::regulator::StageRegulator;
use crate::stage::Stage;
use crate::sync::Arc;
use crate::telemetry::{
    report_to_observer, SpecViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{
    report_violation_to, CarInstanceId, ClientId, CupState, Millis, RemoteClient, StageId,
};

/// A running cup: state machine, registration host, stage loader and the loaded stage.
///
/// Built by [`SessionBuilder`](crate::SessionBuilder). The shell calls
/// [`update`](Self::update) once per tick and feeds inbound client messages to
/// [`receive`](Self::receive).
pub struct CupSession {
    controller: CupController,
    host: RegistrationHost,
    loader: StageLoader,
    pending: Option<LoadHandle>,
    stage: Option<Stage>,
    sink: Box<dyn MessageSink>,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl fmt::Debug for CupSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CupSession")
            .field("state", &self.state())
            .field("stage", &self.controller.cup().current_stage())
            .field("loading", &self.pending.is_some())
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl CupSession {
    pub(crate) fn new(
        controller: CupController,
        loader: StageLoader,
        sink: Box<dyn MessageSink>,
        violation_observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        Self {
            controller,
            host: RegistrationHost::new(),
            loader,
            pending: None,
            stage: None,
            sink,
            violation_observer,
        }
    }

    /// Current cup state.
    #[must_use]
    pub fn state(&self) -> CupState {
        self.controller.state()
    }

    /// The cup.
    #[must_use]
    pub fn cup(&self) -> &Cup {
        self.controller.cup()
    }

    /// Which clients have signalled ready for the current stage.
    #[must_use]
    pub fn readiness(&self) -> &ReadinessTable {
        self.controller.readiness()
    }

    /// The loaded stage, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&Stage> {
        self.stage.as_ref()
    }

    /// Returns `true` while a stage load is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// The registration host.
    #[must_use]
    pub fn host(&self) -> &RegistrationHost {
        &self.host
    }

    /// Returns the violation observer, if one was configured.
    ///
    /// This allows access to the observer for inspection in tests.
    #[must_use]
    pub fn violation_observer(&self) -> Option<&Arc<dyn ViolationObserver>> {
        self.violation_observer.as_ref()
    }

    /// Moves the cup to its next phase. Entering PreInitialization starts the stage load.
    pub fn advance(&mut self) {
        let before = self.controller.state();
        if !self.controller.advance(&mut *self.sink) {
            return;
        }
        if before == CupState::Action {
            self.stage = None;
        }
        if self.controller.state() == CupState::PreInitialization {
            self.start_load();
        }
    }

    /// Emits `Restart` and returns to Registration. Any stage or load in flight is dropped.
    pub fn restart(&mut self) {
        if let Some(handle) = self.pending.take() {
            debug!(stage = %handle.stage_id(), "abandoning stage load");
        }
        self.stage = None;
        self.controller.restart(&mut *self.sink);
    }

    /// Registers a client for the participant behind `from`.
    pub fn register_client(
        &mut self,
        from: RemoteClient,
        players: Vec<PlayerDefinition>,
    ) -> Result<ClientId, CupError> {
        self.host
            .register_client(&mut self.controller, from, players, &mut *self.sink)
    }

    /// Unregisters a client.
    pub fn unregister_client(&mut self, client: ClientId) -> Result<Client, CupError> {
        self.host
            .unregister_client(&mut self.controller, client, &mut *self.sink)
    }

    /// Handles `Ready` from the participant behind `from`, for every client it registered.
    pub fn handle_ready_signal(&mut self, from: RemoteClient) {
        self.host
            .handle_ready_signal(&mut self.controller, from, &mut *self.sink);
    }

    /// Writes control input to a car of the running stage. Returns `false` if dropped.
    pub fn handle_control_update(
        &mut self,
        controllable: CarInstanceId,
        controls: ControlsMask,
    ) -> bool {
        match self.stage.as_mut() {
            Some(stage) if self.controller.state() == CupState::Action => {
                StageRegulator::new(stage).handle_control_update(controllable, controls)
            },
            _ => {
                trace!(car = %controllable, "control update outside a running stage dropped");
                false
            },
        }
    }

    /// Handles one inbound message from a client.
    ///
    /// Only client commands are accepted. Anything else is dropped. The handle is
    /// authoritative for `Ready` and `UnregisterClient`: a payload naming a client that
    /// `from` did not register is ignored, except from [`RemoteClient::Local`] for
    /// unregistration.
    pub fn receive(&mut self, from: RemoteClient, message: Message) {
        match message {
            Message::Advance => self.advance(),
            Message::Ready { client_id } => {
                self.host
                    .handle_ready(&mut self.controller, from, client_id, &mut *self.sink);
            },
            Message::RegisterClient { players } => {
                // The requester has been told why; nothing else to do here.
                let _ = self.register_client(from, players);
            },
            Message::UnregisterClient { client_id } => {
                if from != RemoteClient::Local && !self.host.owns(from, client_id) {
                    trace!(?from, client = %client_id, "unregister for a foreign client ignored");
                    return;
                }
                if let Err(err) = self.unregister_client(client_id) {
                    trace!(?from, error = %err, "unregister ignored");
                }
            },
            Message::ControlUpdate {
                controllable,
                controls,
            } => {
                self.handle_control_update(controllable, controls);
            },
            other => {
                trace!(?from, kind = ?other.kind(), "non-command message from client dropped");
            },
        }
    }

    /// Runs one tick: resolves a finished stage load or steps the running stage.
    ///
    /// The tick that delivers a loaded stage does not also step it.
    pub fn update(&mut self, frame_duration: Millis) {
        if self.poll_load() || self.controller.state() != CupState::Action {
            return;
        }
        if let Some(stage) = self.stage.as_mut() {
            StageRegulator::new(stage).update(frame_duration, &mut *self.sink);
        }
    }

    fn start_load(&mut self) {
        let Some(description) = self.controller.stage_description().cloned() else {
            report_violation_to!(
                self.violation_observer,
                ViolationSeverity::Critical,
                ViolationKind::StateMachine,
                "entered pre-initialization without a stage description"
            );
            return;
        };
        let stage_id = description.stage_id;
        match self.loader.load(description) {
            Ok(handle) => {
                debug!(stage = %stage_id, "stage load started");
                self.pending = Some(handle);
            },
            Err(err) => self.load_failed(stage_id, &err),
        }
    }

    fn poll_load(&mut self) -> bool {
        if !self.pending.as_ref().is_some_and(LoadHandle::is_ready) {
            return false;
        }
        let Some(handle) = self.pending.take() else {
            return false;
        };
        let stage_id = handle.stage_id();
        let elapsed = handle.elapsed();
        match handle.take_result() {
            Ok(stage) => {
                info!(stage = %stage_id, elapsed_ms = elapsed.as_millis(), "stage loaded");
                self.stage = Some(stage);
                self.controller.stage_loaded(&mut *self.sink);
            },
            Err(err) => self.load_failed(stage_id, &err),
        }
        true
    }

    fn load_failed(&mut self, stage_id: StageId, err: &LoadError) {
        let violation = SpecViolation::new(
            ViolationSeverity::Error,
            ViolationKind::StageLoading,
            format!("stage {} failed to load: {}", stage_id, err),
            concat!(file!(), ":", line!()),
        )
        .with_stage(stage_id)
        .with_context("track", self.cup().current_track().map_or("", |t| t.name.as_str()));
        report_to_observer(self.violation_observer.as_ref(), &violation);
        self.controller.stage_load_failed(&mut *self.sink);
    }
}
