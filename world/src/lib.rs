#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Block Cascade.

pub mod cascade;
pub mod grid;
pub mod motion;
pub mod rotation;
pub mod score;

use cascade_core::{
    Cell, CellCoord, Command, Event, GameState, Intent, Piece, Ruleset, RulesetError,
};

pub use cascade::{
    CascadeResolver, ChainObserver, ChainState, IgnoreChainSteps, PassOutcome, RulePass,
};
pub use grid::Grid;
pub use rotation::Rotation;
pub use score::ScoreKeeper;

/// Represents the authoritative Block Cascade world state.
#[derive(Debug)]
pub struct World {
    ruleset: Ruleset,
    grid: Grid,
    resolver: CascadeResolver,
    score: ScoreKeeper,
    state: GameState,
    current: Option<Piece>,
    next: Option<Piece>,
    win_reached: bool,
}

impl World {
    /// Creates an empty world waiting in [`GameState::Spawning`] for its first piece.
    pub fn new(ruleset: Ruleset) -> Result<Self, RulesetError> {
        ruleset.validate()?;
        Ok(Self {
            grid: Grid::new(ruleset.width, ruleset.height),
            resolver: CascadeResolver::from_specs(&ruleset.passes),
            score: ScoreKeeper::new(ruleset.lines_per_level),
            state: GameState::Spawning,
            current: None,
            next: None,
            win_reached: false,
            ruleset,
        })
    }

    fn set_state(&mut self, to: GameState, out_events: &mut Vec<Event>) {
        let from = self.state;
        if from != to {
            self.state = to;
            out_events.push(Event::StateChanged { from, to });
        }
    }

    fn reset(&mut self, out_events: &mut Vec<Event>) {
        self.grid.clear();
        self.score.reset();
        self.current = None;
        self.next = None;
        self.win_reached = false;
        out_events.push(Event::GameReset);
        self.set_state(GameState::Spawning, out_events);
        out_events.push(Event::SpawnRequested { fresh: true });
    }

    fn handle_intent(
        &mut self,
        intent: Intent,
        observer: &mut dyn ChainObserver,
        out_events: &mut Vec<Event>,
    ) {
        match (intent, self.state) {
            (Intent::Reset, _) => self.reset(out_events),
            (Intent::ContinueAfterWin, GameState::Won) => {
                let resumed = if self.current.is_some() {
                    GameState::Falling
                } else {
                    GameState::Spawning
                };
                self.set_state(resumed, out_events);
            }
            (_, GameState::Falling) => self.steer(intent, observer, out_events),
            (_, state) => out_events.push(Event::IntentIgnored { intent, state }),
        }
    }

    fn steer(
        &mut self,
        intent: Intent,
        observer: &mut dyn ChainObserver,
        out_events: &mut Vec<Event>,
    ) {
        let Some(piece) = self.current.as_ref() else {
            out_events.push(Event::IntentIgnored {
                intent,
                state: self.state,
            });
            return;
        };

        match intent {
            Intent::MoveLeft | Intent::MoveRight => {
                let dx = if intent == Intent::MoveLeft { -1 } else { 1 };
                if !self.translate(dx, 0, out_events) {
                    out_events.push(Event::MoveRejected { intent });
                }
            }
            Intent::SoftDrop => {
                if !self.translate(0, 1, out_events) {
                    self.lock(observer, out_events);
                }
            }
            Intent::HardDrop => {
                let distance = motion::drop_distance(&self.grid, piece);
                if distance > 0 {
                    let moved = self.translate(0, distance, out_events);
                    debug_assert!(moved, "hard drop of {distance} rows was blocked");
                }
                self.lock(observer, out_events);
            }
            Intent::RotateClockwise => match rotation::rotate(&self.grid, piece) {
                Rotation::Rotated { piece, kick } => {
                    out_events.push(Event::PieceRotated {
                        rotation: piece.rotation(),
                        kick,
                    });
                    self.current = Some(piece);
                }
                Rotation::Blocked { .. } => out_events.push(Event::MoveRejected { intent }),
            },
            Intent::Reset | Intent::ContinueAfterWin => out_events.push(Event::IntentIgnored {
                intent,
                state: self.state,
            }),
        }
    }

    fn translate(&mut self, dx: i32, dy: i32, out_events: &mut Vec<Event>) -> bool {
        let Some(piece) = self.current.as_ref() else {
            return false;
        };
        if !motion::can_place(&self.grid, piece, dx, dy) {
            return false;
        }
        let moved = piece.shifted(dx, dy);
        out_events.push(Event::PieceMoved {
            column: moved.column(),
            row: moved.row(),
        });
        self.current = Some(moved);
        true
    }

    fn lock(&mut self, observer: &mut dyn ChainObserver, out_events: &mut Vec<Event>) {
        let Some(piece) = self.current.take() else {
            return;
        };

        let mut written = Vec::new();
        for (column, row, kind) in piece.cells() {
            // Sub-cells above the visible grid are discarded.
            let (Ok(column), Ok(row)) = (u32::try_from(column), u32::try_from(row)) else {
                continue;
            };
            let coord = CellCoord::new(column, row);
            let result = self.grid.set(coord, Cell::from(kind));
            debug_assert!(result.is_ok(), "locked cell {coord:?} outside the grid");
            if result.is_ok() {
                written.push(coord);
            }
        }
        out_events.push(Event::PieceLocked { cells: written });

        self.set_state(GameState::Resolving, out_events);
        let chain = self
            .resolver
            .run(&mut self.grid, &mut self.score, observer, out_events);
        out_events.push(Event::CascadeSettled {
            chain: chain.chain,
            points: chain.score_delta,
        });

        // Values merged away or cleared later in the cascade still count.
        let largest = chain.peak_value.max(self.grid.max_numeric());
        let won = !self.win_reached
            && self
                .ruleset
                .win_value
                .is_some_and(|target| largest >= target);
        if won {
            self.win_reached = true;
            out_events.push(Event::WinReached { value: largest });
            self.set_state(GameState::Won, out_events);
        } else {
            self.set_state(GameState::Spawning, out_events);
        }
        out_events.push(Event::SpawnRequested { fresh: false });
    }

    fn auto_fall(&mut self, observer: &mut dyn ChainObserver, out_events: &mut Vec<Event>) {
        if self.state != GameState::Falling {
            return;
        }
        if !self.translate(0, 1, out_events) {
            self.lock(observer, out_events);
        }
    }

    fn spawn(&mut self, current: Piece, next: Piece, out_events: &mut Vec<Event>) {
        let awaiting_piece = matches!(self.state, GameState::Spawning | GameState::Won)
            && self.current.is_none();
        if !awaiting_piece {
            return;
        }

        self.next = Some(next);
        if !motion::can_place(&self.grid, &current, 0, 0) {
            self.set_state(GameState::GameOver, out_events);
            out_events.push(Event::GameOver {
                score: self.score.score(),
            });
            return;
        }

        out_events.push(Event::PieceSpawned {
            piece: current.clone(),
        });
        self.current = Some(current);
        if self.state == GameState::Spawning {
            self.set_state(GameState::Falling, out_events);
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    apply_observed(world, command, &mut IgnoreChainSteps, out_events);
}

/// Applies the command, reporting every cascade chain step to `observer`.
pub fn apply_observed(
    world: &mut World,
    command: Command,
    observer: &mut dyn ChainObserver,
    out_events: &mut Vec<Event>,
) {
    match command {
        Command::Intent { intent } => world.handle_intent(intent, observer, out_events),
        Command::Tick { dt } => out_events.push(Event::TimeAdvanced { dt }),
        Command::AutoFall => world.auto_fall(observer, out_events),
        Command::SpawnPiece { current, next } => world.spawn(current, next, out_events),
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use cascade_core::{GameSnapshot, GameState, Piece, Ruleset};

    use super::{Grid, ScoreKeeper, World};

    /// Provides read-only access to the locked cells.
    #[must_use]
    pub fn grid(world: &World) -> &Grid {
        &world.grid
    }

    /// Active state of the game state machine.
    #[must_use]
    pub fn state(world: &World) -> GameState {
        world.state
    }

    /// Piece currently falling, if any.
    #[must_use]
    pub fn current_piece(world: &World) -> Option<&Piece> {
        world.current.as_ref()
    }

    /// Lookahead piece, if already drawn.
    #[must_use]
    pub fn next_piece(world: &World) -> Option<&Piece> {
        world.next.as_ref()
    }

    /// Running score totals.
    #[must_use]
    pub fn score(world: &World) -> &ScoreKeeper {
        &world.score
    }

    /// Current level derived from cleared rows.
    #[must_use]
    pub fn level(world: &World) -> u32 {
        world.score.level()
    }

    /// Ruleset the world was created with.
    #[must_use]
    pub fn ruleset(world: &World) -> &Ruleset {
        &world.ruleset
    }

    /// Captures everything a presentation adapter draws in a frame.
    #[must_use]
    pub fn snapshot(world: &World) -> GameSnapshot {
        GameSnapshot {
            grid: world.grid.snapshot(),
            current_piece: world.current.clone(),
            next_piece: world.next.clone(),
            score: world.score.score(),
            level: world.score.level(),
            lines_cleared: world.score.lines_cleared(),
            last_chain: world.score.last_chain(),
            max_chain: world.score.max_chain(),
            max_value: world.score.max_value(),
            state: world.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{CellKind, ColorTag, Shape};

    fn single(kind: CellKind) -> Shape {
        Shape::from_cells(1, 1, vec![Some(kind)]).expect("valid shape")
    }

    fn red() -> CellKind {
        CellKind::Color(ColorTag::new(0))
    }

    fn started(ruleset: Ruleset, shape: Shape) -> (World, Vec<Event>) {
        let mut world = World::new(ruleset).expect("valid ruleset");
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Intent {
                intent: Intent::Reset,
            },
            &mut events,
        );
        let width = query::ruleset(&world).width;
        apply(
            &mut world,
            Command::SpawnPiece {
                current: Piece::spawned(shape.clone(), width),
                next: Piece::spawned(shape, width),
            },
            &mut events,
        );
        (world, events)
    }

    fn intent(world: &mut World, intent: Intent) -> Vec<Event> {
        let mut events = Vec::new();
        apply(world, Command::Intent { intent }, &mut events);
        events
    }

    #[test]
    fn new_world_rejects_invalid_rulesets() {
        let mut ruleset = Ruleset::tetris();
        ruleset.width = 0;
        assert!(matches!(
            World::new(ruleset),
            Err(RulesetError::EmptyGrid { .. })
        ));
    }

    #[test]
    fn reset_requests_fresh_pieces() {
        let mut world = World::new(Ruleset::puyo()).expect("valid ruleset");
        let events = intent(&mut world, Intent::Reset);
        assert_eq!(
            events,
            vec![Event::GameReset, Event::SpawnRequested { fresh: true }]
        );
        assert_eq!(query::state(&world), GameState::Spawning);
    }

    #[test]
    fn spawn_enters_falling_state() {
        let (world, events) = started(Ruleset::tetris(), single(red()));
        assert_eq!(query::state(&world), GameState::Falling);
        assert!(events.contains(&Event::StateChanged {
            from: GameState::Spawning,
            to: GameState::Falling,
        }));
        let piece = query::current_piece(&world).expect("piece spawned");
        assert_eq!((piece.column(), piece.row()), (5, 0));
        assert!(query::next_piece(&world).is_some());
    }

    #[test]
    fn moves_against_the_wall_are_rejected() {
        let (mut world, _) = started(Ruleset::tetris(), single(red()));
        for _ in 0..5 {
            let events = intent(&mut world, Intent::MoveLeft);
            assert!(matches!(events.as_slice(), [Event::PieceMoved { .. }]));
        }
        let events = intent(&mut world, Intent::MoveLeft);
        assert_eq!(
            events,
            vec![Event::MoveRejected {
                intent: Intent::MoveLeft
            }]
        );
        let piece = query::current_piece(&world).expect("still falling");
        assert_eq!(piece.column(), 0);
    }

    #[test]
    fn soft_drop_on_the_floor_locks() {
        let (mut world, _) = started(Ruleset::tetris(), single(red()));
        for _ in 0..19 {
            let events = intent(&mut world, Intent::SoftDrop);
            assert!(matches!(events.as_slice(), [Event::PieceMoved { .. }]));
        }
        let events = intent(&mut world, Intent::SoftDrop);
        assert_eq!(
            events.first(),
            Some(&Event::PieceLocked {
                cells: vec![CellCoord::new(5, 19)]
            })
        );
        assert_eq!(events.last(), Some(&Event::SpawnRequested { fresh: false }));
        assert_eq!(query::state(&world), GameState::Spawning);
        assert!(query::current_piece(&world).is_none());
        assert_eq!(
            query::grid(&world).get(CellCoord::new(5, 19)),
            Ok(Cell::Occupied(red()))
        );
    }

    #[test]
    fn hard_drop_lands_and_locks() {
        let (mut world, _) = started(Ruleset::puyo(), single(red()));
        let events = intent(&mut world, Intent::HardDrop);
        assert_eq!(events[0], Event::PieceMoved { column: 3, row: 11 });
        assert!(events.contains(&Event::CascadeSettled {
            chain: 0,
            points: 0
        }));
        assert_eq!(query::grid(&world).occupied_count(), 1);
    }

    #[test]
    fn hard_drop_at_rest_locks_in_place() {
        let (mut world, _) = started(Ruleset::puyo(), single(red()));
        world
            .grid
            .set(CellCoord::new(3, 1), Cell::color(1))
            .expect("in bounds");
        let events = intent(&mut world, Intent::HardDrop);
        assert_eq!(
            events.first(),
            Some(&Event::PieceLocked {
                cells: vec![CellCoord::new(3, 0)]
            })
        );
        assert!(!events
            .iter()
            .any(|event| matches!(event, Event::PieceMoved { .. })));
        assert_eq!(query::grid(&world).occupied_count(), 2);
    }

    #[test]
    fn intents_outside_falling_are_ignored() {
        let mut world = World::new(Ruleset::tetris()).expect("valid ruleset");
        let events = intent(&mut world, Intent::HardDrop);
        assert_eq!(
            events,
            vec![Event::IntentIgnored {
                intent: Intent::HardDrop,
                state: GameState::Spawning,
            }]
        );
        let events = intent(&mut world, Intent::ContinueAfterWin);
        assert!(matches!(events.as_slice(), [Event::IntentIgnored { .. }]));
    }

    #[test]
    fn cells_above_the_grid_are_discarded_on_lock() {
        let (mut world, _) = started(Ruleset::puyo(), single(red()));
        let tall = Shape::from_cells(1, 3, vec![Some(red()); 3]).expect("valid shape");
        world.current = Some(Piece::new(tall, 0, -2));
        let events = intent(&mut world, Intent::SoftDrop);
        assert!(matches!(events.as_slice(), [Event::PieceMoved { column: 0, row: -1 }]));
        world.grid.set(CellCoord::new(0, 2), Cell::color(1)).expect("in bounds");
        let events = intent(&mut world, Intent::SoftDrop);
        assert_eq!(
            events.first(),
            Some(&Event::PieceLocked {
                cells: vec![CellCoord::new(0, 0), CellCoord::new(0, 1)]
            })
        );
    }

    #[test]
    fn auto_fall_moves_only_while_falling() {
        let (mut world, _) = started(Ruleset::tetris(), single(red()));
        let mut events = Vec::new();
        apply(&mut world, Command::AutoFall, &mut events);
        assert_eq!(events, vec![Event::PieceMoved { column: 5, row: 1 }]);

        let mut idle = World::new(Ruleset::tetris()).expect("valid ruleset");
        let mut events = Vec::new();
        apply(&mut idle, Command::AutoFall, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn snapshot_reflects_world() {
        let (world, _) = started(Ruleset::tetorisu(), single(CellKind::Numeric(2)));
        let snapshot = query::snapshot(&world);
        assert_eq!(snapshot.state, GameState::Falling);
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.grid.width(), 10);
        assert_eq!(snapshot.current_piece.as_ref(), query::current_piece(&world));
    }
}
