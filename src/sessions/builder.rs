//! Consuming builder for [`CupSession`].

use crate::cup::{Cup, CupSettings};
use crate::error::CupError;
use crate::rng::{Pcg32, SeedableRng};
use crate::routing::distributor::LocalSink;
use crate::routing::MessageSink;
use crate::sessions::controller::CupController;
use crate::sessions::session::CupSession;
use crate::stage::loader::{HeadlessFactory, StageFactory, StageLoader};
use crate::sync::Arc;
use crate::telemetry::ViolationObserver;

/// The [`SessionBuilder`] builds [`CupSession`]s.
///
/// Every setting has a default: an empty cup of default [`CupSettings`], a
/// [`LocalSink`] with no receivers attached, a [`HeadlessFactory`], violations
/// reported through [`tracing`], and a PRNG seeded from the clock.
#[must_use = "SessionBuilder must be consumed by calling start_session"]
pub struct SessionBuilder {
    settings: CupSettings,
    sink: Option<Box<dyn MessageSink>>,
    factory: Option<Arc<dyn StageFactory>>,
    /// Optional observer for contract violations.
    violation_observer: Option<Arc<dyn ViolationObserver>>,
    /// Fixed PRNG seed, for reproducible client keys and car draws.
    seed: Option<u64>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure so a new field cannot be forgotten here.
        let Self {
            settings,
            sink,
            factory,
            violation_observer,
            seed,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("settings", settings)
            .field("has_sink", &sink.is_some())
            .field("has_factory", &factory.is_some())
            .field("has_violation_observer", &violation_observer.is_some())
            .field("seed", seed)
            .finish()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            settings: CupSettings::default(),
            sink: None,
            factory: None,
            violation_observer: None,
            seed: None,
        }
    }

    /// Sets the cup settings. They are validated by [`start_session`](Self::start_session).
    pub fn with_settings(mut self, settings: CupSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets where emitted messages go.
    ///
    /// Use a [`MessageDistributor`](crate::MessageDistributor) for networked sessions.
    pub fn with_sink(mut self, sink: impl MessageSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Sets the factory that builds stage worlds on the loader thread.
    pub fn with_stage_factory(mut self, factory: Arc<dyn StageFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets a custom observer for contract violations.
    ///
    /// ```
    /// use pitlane::{SessionBuilder, telemetry::CollectingObserver};
    /// use std::sync::Arc;
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let session = SessionBuilder::new()
    ///     .with_violation_observer(observer.clone())
    ///     .start_session()
    ///     .expect("default settings are valid");
    ///
    /// assert!(session.violation_observer().is_some());
    /// assert!(observer.violations().is_empty());
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Seeds the session PRNG.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Consumes the builder to construct a [`CupSession`] in Registration.
    ///
    /// # Errors
    /// - Returns [`InvalidConfiguration`] if the settings fail [`CupSettings::validate`].
    ///
    /// [`InvalidConfiguration`]: CupError::InvalidConfiguration
    pub fn start_session(self) -> Result<CupSession, CupError> {
        self.settings.validate()?;
        let rng = match self.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(HeadlessFactory) as Arc<dyn StageFactory>);
        let sink = self
            .sink
            .unwrap_or_else(|| Box::new(LocalSink::new()) as Box<dyn MessageSink>);
        Ok(CupSession::new(
            CupController::new(Cup::new(self.settings), rng),
            StageLoader::new(factory),
            sink,
            self.violation_observer,
        ))
    }
}
