#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Engine boundary that wires the world to its systems.
//!
//! A [`Session`] owns one [`World`] together with the spawning and auto-fall
//! systems. Every intent or tick is applied to the world, and the resulting
//! events are pumped through the systems until no further commands appear.

use std::{fmt, thread, time::Duration};

use cascade_core::{Command, Event, GameSnapshot, Intent, Ruleset, RulesetError};
use cascade_system_auto_fall::{self as auto_fall, AutoFall};
use cascade_system_spawning::{self as spawning, Spawning};
use cascade_world::{self as world, query, ChainObserver, Grid, IgnoreChainSteps, World};

/// Upper bound for the pause inserted after every chain step.
pub const MAX_CHAIN_STEP_DELAY: Duration = Duration::from_secs(1);

/// How the world reacted to an intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntentOutcome {
    /// The intent changed the game.
    Applied,
    /// The intent was illegal for the current placement.
    Rejected,
    /// The intent has no meaning in the current state.
    Ignored,
}

/// Chain observer wrapper that pauses after forwarding each step.
pub struct PacedObserver {
    inner: Box<dyn ChainObserver>,
    delay: Duration,
}

impl PacedObserver {
    /// Wraps `inner`, clamping the pause to [`MAX_CHAIN_STEP_DELAY`].
    #[must_use]
    pub fn new(inner: Box<dyn ChainObserver>, delay: Duration) -> Self {
        Self {
            inner,
            delay: delay.min(MAX_CHAIN_STEP_DELAY),
        }
    }

    /// Pause applied after every chain step.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl ChainObserver for PacedObserver {
    fn on_chain_step(&mut self, grid: &Grid, chain: u32) {
        self.inner.on_chain_step(grid, chain);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl fmt::Debug for PacedObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacedObserver")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

/// Running game driven by intents and elapsed time.
#[derive(Debug)]
pub struct Session {
    world: World,
    spawning: Spawning,
    auto_fall: AutoFall,
    observer: PacedObserver,
    log: Vec<Event>,
}

impl Session {
    /// Starts a new game with the provided ruleset and piece seed.
    pub fn new(ruleset: Ruleset, seed: u64) -> Result<Self, RulesetError> {
        Self::with_observer(ruleset, seed, Box::new(IgnoreChainSteps), Duration::ZERO)
    }

    /// Starts a new game whose cascades report every chain step to `observer`.
    ///
    /// The session pauses for `delay` after each step, capped at
    /// [`MAX_CHAIN_STEP_DELAY`].
    pub fn with_observer(
        ruleset: Ruleset,
        seed: u64,
        observer: Box<dyn ChainObserver>,
        delay: Duration,
    ) -> Result<Self, RulesetError> {
        let spawning = Spawning::new(spawning::Config::from_ruleset(&ruleset, seed))?;
        let auto_fall = AutoFall::new(auto_fall::Config::new(ruleset.fall));
        let world = World::new(ruleset)?;
        let mut session = Self {
            world,
            spawning,
            auto_fall,
            observer: PacedObserver::new(observer, delay),
            log: Vec::new(),
        };
        let _ = session.dispatch(Command::Intent {
            intent: Intent::Reset,
        });
        Ok(session)
    }

    /// Applies a player intent.
    pub fn handle_intent(&mut self, intent: Intent) -> IntentOutcome {
        let events = self.dispatch(Command::Intent { intent });
        let outcome = events.iter().find_map(|event| match event {
            Event::MoveRejected { .. } => Some(IntentOutcome::Rejected),
            Event::IntentIgnored { .. } => Some(IntentOutcome::Ignored),
            _ => None,
        });
        outcome.unwrap_or(IntentOutcome::Applied)
    }

    /// Advances the simulation clock, attempting auto-falls as intervals elapse.
    pub fn advance_time(&mut self, elapsed: Duration) {
        let _ = self.dispatch(Command::Tick { dt: elapsed });
    }

    /// Captures everything a presentation adapter draws in a frame.
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        query::snapshot(&self.world)
    }

    /// Events recorded since the session started or was last drained.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.log
    }

    /// Removes and returns the recorded events.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.log)
    }

    /// Read-only access to the authoritative world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Ruleset the session plays.
    #[must_use]
    pub fn ruleset(&self) -> &Ruleset {
        query::ruleset(&self.world)
    }

    /// Applies the command and pumps systems until they stop responding.
    ///
    /// Returns the events produced directly by `command`.
    fn dispatch(&mut self, command: Command) -> Vec<Event> {
        let mut immediate = Vec::new();
        world::apply_observed(&mut self.world, command, &mut self.observer, &mut immediate);
        self.log.extend(immediate.iter().cloned());

        let mut pending = immediate.clone();
        loop {
            let mut commands = Vec::new();
            self.spawning
                .handle(&pending, query::level(&self.world), &mut commands);
            self.auto_fall.handle(
                &pending,
                query::state(&self.world),
                query::level(&self.world),
                &mut commands,
            );
            if commands.is_empty() {
                break;
            }

            pending.clear();
            for command in commands {
                world::apply_observed(&mut self.world, command, &mut self.observer, &mut pending);
            }
            self.log.extend(pending.iter().cloned());
        }

        immediate
    }
}
