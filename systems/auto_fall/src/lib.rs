#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Timer system that turns elapsed time into auto-fall commands.

use std::time::Duration;

use cascade_core::{Command, Event, FallTuning, GameState};

/// Configuration parameters required to construct the auto-fall system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    tuning: FallTuning,
}

impl Config {
    /// Creates a new configuration using the provided interval curve.
    #[must_use]
    pub const fn new(tuning: FallTuning) -> Self {
        Self { tuning }
    }
}

/// Pure system that emits one fall attempt whenever the interval elapses.
#[derive(Debug)]
pub struct AutoFall {
    tuning: FallTuning,
    accumulator: Duration,
}

impl AutoFall {
    /// Creates a new auto-fall system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            tuning: config.tuning,
            accumulator: Duration::ZERO,
        }
    }

    /// Consumes events and the current state to emit auto-fall commands.
    ///
    /// Time only accumulates while a piece is falling. Once the accumulated
    /// time exceeds the interval for `level`, a single [`Command::AutoFall`]
    /// is emitted and the accumulator restarts from zero.
    pub fn handle(
        &mut self,
        events: &[Event],
        state: GameState,
        level: u32,
        out: &mut Vec<Command>,
    ) {
        if state != GameState::Falling {
            self.accumulator = Duration::ZERO;
            return;
        }

        let accumulated = events
            .iter()
            .filter_map(|event| match event {
                Event::TimeAdvanced { dt } => Some(*dt),
                _ => None,
            })
            .fold(Duration::ZERO, Duration::saturating_add);
        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        if self.accumulator > self.interval(level) {
            self.accumulator = Duration::ZERO;
            out.push(Command::AutoFall);
        }
    }

    /// Interval between fall attempts at the provided level.
    #[must_use]
    pub fn interval(&self, level: u32) -> Duration {
        self.tuning.interval_for_level(level)
    }

    /// Time accumulated toward the next fall attempt.
    #[must_use]
    pub const fn accumulated(&self) -> Duration {
        self.accumulator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(millis: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(millis),
        }
    }

    #[test]
    fn falls_once_the_interval_is_exceeded() {
        let mut system = AutoFall::new(Config::new(FallTuning::default()));
        let mut commands = Vec::new();

        system.handle(&[tick(300)], GameState::Falling, 1, &mut commands);
        assert!(commands.is_empty());
        system.handle(&[tick(200)], GameState::Falling, 1, &mut commands);
        assert!(commands.is_empty(), "exactly one interval does not fall");
        system.handle(&[tick(1)], GameState::Falling, 1, &mut commands);
        assert_eq!(commands, vec![Command::AutoFall]);
        assert_eq!(system.accumulated(), Duration::ZERO);
    }

    #[test]
    fn long_frames_emit_a_single_attempt() {
        let mut system = AutoFall::new(Config::new(FallTuning::default()));
        let mut commands = Vec::new();
        system.handle(&[tick(1_600), tick(900)], GameState::Falling, 1, &mut commands);
        assert_eq!(commands, vec![Command::AutoFall]);
    }

    #[test]
    fn higher_levels_fall_faster() {
        let mut system = AutoFall::new(Config::new(FallTuning::default()));
        assert_eq!(system.interval(5), Duration::from_millis(300));
        let mut commands = Vec::new();
        system.handle(&[tick(301)], GameState::Falling, 5, &mut commands);
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn other_states_reset_the_accumulator() {
        let mut system = AutoFall::new(Config::new(FallTuning::default()));
        let mut commands = Vec::new();
        system.handle(&[tick(400)], GameState::Falling, 1, &mut commands);
        system.handle(&[tick(400)], GameState::Won, 1, &mut commands);
        assert_eq!(system.accumulated(), Duration::ZERO);
        system.handle(&[tick(400)], GameState::Falling, 1, &mut commands);
        assert!(commands.is_empty());
    }
}
