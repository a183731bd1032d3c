#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Block Cascade engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing player intents and elapsed time, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to deterministically. Systems consume event streams and
//! respond exclusively with new command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

mod ruleset;

pub use ruleset::{
    FallTuning, MatchEffect, Matcher, RulePassKind, RulePassSpec, Ruleset, RulesetError,
    ShapeEntry, ShapeFill, ShapeMask, BUILTIN_RULESETS,
};

/// Discrete player intents produced by input adapters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Shift the falling piece one column toward decreasing column indices.
    MoveLeft,
    /// Shift the falling piece one column toward increasing column indices.
    MoveRight,
    /// Move the falling piece one row down, locking it when the move is blocked.
    SoftDrop,
    /// Drop the falling piece as far as it goes and lock it immediately.
    HardDrop,
    /// Rotate the falling piece a quarter turn clockwise, applying wall kicks.
    RotateClockwise,
    /// Reinitialise the whole game model.
    Reset,
    /// Resume play after the win overlay was shown.
    ContinueAfterWin,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Applies a player intent to the falling piece or the game lifecycle.
    Intent {
        /// Intent requested by the adapter.
        intent: Intent,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests a timer-driven fall of the current piece by one row.
    AutoFall,
    /// Installs the next falling piece together with the lookahead piece.
    SpawnPiece {
        /// Piece that becomes the falling piece.
        current: Piece,
        /// Piece shown as the upcoming piece.
        next: Piece,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces a transition of the game state machine.
    StateChanged {
        /// State that was active before the transition.
        from: GameState,
        /// State that became active.
        to: GameState,
    },
    /// Confirms that a new falling piece entered the grid.
    PieceSpawned {
        /// Piece that is now falling.
        piece: Piece,
    },
    /// Confirms that the falling piece was translated.
    PieceMoved {
        /// Column of the piece origin after the move.
        column: i32,
        /// Row of the piece origin after the move.
        row: i32,
    },
    /// Confirms that the falling piece was rotated.
    PieceRotated {
        /// Rotation index after the turn.
        rotation: u8,
        /// Horizontal kick that made the rotation legal.
        kick: i32,
    },
    /// Reports that an intent was illegal for the current placement.
    MoveRejected {
        /// Intent that was rejected without mutating anything.
        intent: Intent,
    },
    /// Reports that an intent has no meaning in the current state.
    IntentIgnored {
        /// Intent that was dropped.
        intent: Intent,
        /// State that was active when the intent arrived.
        state: GameState,
    },
    /// Confirms that the falling piece was absorbed into the grid.
    PieceLocked {
        /// Grid cells written by the lock, in piece order.
        cells: Vec<CellCoord>,
    },
    /// Reports that a rule pass changed the grid during cascade resolution.
    RulePassFired {
        /// Kind of the pass that fired.
        pass: RulePassKind,
        /// Score multiplier applied to the pass.
        multiplier: u32,
        /// Points credited after applying the multiplier.
        points: u64,
    },
    /// Announces that a chain step completed.
    ChainStep {
        /// One-based index of the completed chain step.
        chain: u32,
    },
    /// Reports that full rows were removed from the grid.
    RowsCleared {
        /// Number of rows removed by a single pass.
        rows: u32,
        /// Cumulative number of rows cleared in the current game.
        total: u64,
    },
    /// Announces that cascade resolution reached its fixpoint.
    CascadeSettled {
        /// Number of chain steps the cascade produced.
        chain: u32,
        /// Points credited across the whole cascade.
        points: u64,
    },
    /// Asks the spawning system for the next piece.
    SpawnRequested {
        /// Indicates that any lookahead piece belongs to a previous game.
        fresh: bool,
    },
    /// Announces that the configured win value appeared on the grid.
    WinReached {
        /// Largest numeric value present on the grid.
        value: u32,
    },
    /// Announces that a spawned piece could not be placed.
    GameOver {
        /// Final score of the game.
        score: u64,
    },
    /// Confirms that the game model was reinitialised.
    GameReset,
}

/// Top-level states of the game state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Waiting for the spawning system to supply the next piece.
    Spawning,
    /// A piece is falling and accepts movement intents.
    Falling,
    /// Cascade resolution is running.
    Resolving,
    /// A spawned piece was blocked; only a reset leaves this state.
    GameOver,
    /// The win value was reached; play resumes on continue.
    Won,
}

/// Colour index assigned to a coloured cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColorTag(u8);

impl ColorTag {
    /// Creates a new colour tag with the provided palette index.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the palette index.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Payload carried by an occupied cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellKind {
    /// Coloured block matched by colour.
    Color(ColorTag),
    /// Numeric tile merged by value.
    Numeric(u32),
    /// Unit marker matched by adjacency alone.
    Marker,
}

/// Single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    /// Nothing occupies the cell.
    #[default]
    Empty,
    /// A block occupies the cell.
    Occupied(CellKind),
}

impl Cell {
    /// Creates a coloured cell.
    #[must_use]
    pub const fn color(value: u8) -> Self {
        Self::Occupied(CellKind::Color(ColorTag::new(value)))
    }

    /// Creates a numeric cell.
    #[must_use]
    pub const fn numeric(value: u32) -> Self {
        Self::Occupied(CellKind::Numeric(value))
    }

    /// Creates a unit marker cell.
    #[must_use]
    pub const fn marker() -> Self {
        Self::Occupied(CellKind::Marker)
    }

    /// Reports whether the cell is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Reports whether a block occupies the cell.
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        !self.is_empty()
    }

    /// Payload of the occupying block, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<CellKind> {
        match self {
            Self::Empty => None,
            Self::Occupied(kind) => Some(*kind),
        }
    }

    /// Value of a numeric cell, if the cell is numeric.
    #[must_use]
    pub const fn numeric_value(&self) -> Option<u32> {
        match self {
            Self::Occupied(CellKind::Numeric(value)) => Some(*value),
            _ => None,
        }
    }
}

impl From<CellKind> for Cell {
    fn from(kind: CellKind) -> Self {
        Self::Occupied(kind)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
///
/// Row zero is the spawn row at the top of the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Reasons a grid access may fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The coordinate lies outside the grid dimensions.
    #[error("cell ({column}, {row}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        /// Requested column.
        column: u32,
        /// Requested row.
        row: u32,
        /// Grid width in cells.
        width: u32,
        /// Grid height in cells.
        height: u32,
    },
}

/// Immutable rectangular mask describing the sub-cells of a piece.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    width: u32,
    height: u32,
    cells: Vec<Option<CellKind>>,
}

impl Shape {
    /// Creates a shape from row-major sub-cells.
    ///
    /// Returns `None` when the dimensions do not match the cell count or the
    /// shape contains no occupied sub-cell.
    #[must_use]
    pub fn from_cells(width: u32, height: u32, cells: Vec<Option<CellKind>>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        if expected == 0 || cells.len() != expected || cells.iter().all(Option::is_none) {
            return None;
        }
        Some(Self {
            width,
            height,
            cells,
        })
    }

    /// Number of sub-cell columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of sub-cell rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Payload of the sub-cell at the local coordinate, if occupied.
    #[must_use]
    pub fn get(&self, column: u32, row: u32) -> Option<CellKind> {
        if column >= self.width || row >= self.height {
            return None;
        }
        let index = usize::try_from(row * self.width + column).ok()?;
        self.cells.get(index).copied().flatten()
    }

    /// Iterator over occupied sub-cells as `(column, row, kind)` in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (u32, u32, CellKind)> + '_ {
        let width = self.width.max(1);
        self.cells.iter().enumerate().filter_map(move |(index, cell)| {
            let index = u32::try_from(index).ok()?;
            cell.map(|kind| (index % width, index / width, kind))
        })
    }

    /// Returns a copy whose occupied sub-cells are replaced by `f(kind)`.
    #[must_use]
    pub fn map_kinds(&self, mut f: impl FnMut(CellKind) -> CellKind) -> Self {
        Self {
            width: self.width,
            height: self.height,
            cells: self
                .cells
                .iter()
                .copied()
                .map(|cell| cell.map(&mut f))
                .collect(),
        }
    }

    /// Returns the shape turned a quarter turn clockwise.
    ///
    /// The sub-cell at `(column, row)` moves to `(height - 1 - row, column)`.
    #[must_use]
    pub fn rotated_clockwise(&self) -> Self {
        let width = self.height;
        let height = self.width;
        let mut cells = vec![None; self.cells.len()];
        for (column, row, kind) in self.occupied() {
            let new_column = self.height - 1 - row;
            let new_row = column;
            if let Ok(index) = usize::try_from(new_row * width + new_column) {
                cells[index] = Some(kind);
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }
}

/// Falling piece: an immutable shape plus a mutable position and rotation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    shape: Shape,
    column: i32,
    row: i32,
    rotation: u8,
}

impl Piece {
    /// Creates a piece whose shape origin sits at the provided position.
    #[must_use]
    pub const fn new(shape: Shape, column: i32, row: i32) -> Self {
        Self {
            shape,
            column,
            row,
            rotation: 0,
        }
    }

    /// Creates a piece horizontally centred on the spawn row of a grid.
    #[must_use]
    pub fn spawned(shape: Shape, grid_width: u32) -> Self {
        let centre = i64::from(grid_width / 2) - i64::from(shape.width() / 2);
        let column = i32::try_from(centre).unwrap_or(0);
        Self::new(shape, column, 0)
    }

    /// Shape currently occupied by the piece.
    #[must_use]
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Column of the shape origin.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Row of the shape origin. Negative rows lie above the visible grid.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Rotation index in `0..4`.
    #[must_use]
    pub const fn rotation(&self) -> u8 {
        self.rotation
    }

    /// Returns a copy of the piece translated by the provided offsets.
    #[must_use]
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self {
            shape: self.shape.clone(),
            column: self.column.saturating_add(dx),
            row: self.row.saturating_add(dy),
            rotation: self.rotation,
        }
    }

    /// Returns a copy of the piece turned clockwise around the unchanged origin.
    #[must_use]
    pub fn rotated_clockwise(&self) -> Self {
        Self {
            shape: self.shape.rotated_clockwise(),
            column: self.column,
            row: self.row,
            rotation: (self.rotation + 1) % 4,
        }
    }

    /// Iterator over occupied sub-cells in absolute grid coordinates.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, CellKind)> + '_ {
        self.shape.occupied().map(move |(column, row, kind)| {
            (
                self.column.saturating_add(to_signed(column)),
                self.row.saturating_add(to_signed(row)),
                kind,
            )
        })
    }
}

fn to_signed(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Owned copy of the grid cells captured for presentation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSnapshot {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl GridSnapshot {
    /// Creates a snapshot from row-major cells.
    #[must_use]
    pub fn new(width: u32, height: u32, cells: Vec<Cell>) -> Self {
        Self {
            width,
            height,
            cells,
        }
    }

    /// Width of the grid in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the grid in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell stored at the provided coordinate, if it lies within the grid.
    #[must_use]
    pub fn cell(&self, coord: CellCoord) -> Option<Cell> {
        if coord.column() >= self.width || coord.row() >= self.height {
            return None;
        }
        let index = usize::try_from(coord.row() * self.width + coord.column()).ok()?;
        self.cells.get(index).copied()
    }

    /// Iterator over rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        let width = usize::try_from(self.width).unwrap_or(0).max(1);
        self.cells.chunks(width)
    }
}

/// Read-only snapshot of everything a presentation adapter draws in a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSnapshot {
    /// Locked grid cells.
    pub grid: GridSnapshot,
    /// Piece currently falling, if any.
    pub current_piece: Option<Piece>,
    /// Lookahead piece, if already drawn.
    pub next_piece: Option<Piece>,
    /// Accumulated score.
    pub score: u64,
    /// Current level derived from cleared rows.
    pub level: u32,
    /// Total number of rows cleared.
    pub lines_cleared: u64,
    /// Chain length produced by the most recent cascade.
    pub last_chain: u32,
    /// Longest chain produced in the current game.
    pub max_chain: u32,
    /// Largest numeric value produced in the current game.
    pub max_value: u32,
    /// Active state of the game state machine.
    pub state: GameState,
}

#[cfg(test)]
mod tests {
    use super::{Cell, CellKind, ColorTag, GameState, GridSnapshot, Piece, Shape};
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    fn l_shape() -> Shape {
        let x = Some(CellKind::Color(ColorTag::new(3)));
        Shape::from_cells(3, 2, vec![x, x, x, x, None, None]).expect("valid shape")
    }

    #[test]
    fn grid_snapshot_round_trips_through_bincode() {
        let snapshot = GridSnapshot::new(
            2,
            2,
            vec![Cell::Empty, Cell::numeric(8), Cell::marker(), Cell::color(1)],
        );
        assert_round_trip(&snapshot);
        assert_round_trip(&GameState::Won);
    }

    #[test]
    fn shape_rejects_empty_and_mismatched_masks() {
        assert!(Shape::from_cells(2, 1, vec![None, None]).is_none());
        assert!(Shape::from_cells(2, 2, vec![Some(CellKind::Marker)]).is_none());
        assert!(Shape::from_cells(0, 0, Vec::new()).is_none());
    }

    #[test]
    fn clockwise_rotation_transposes_and_reverses() {
        let rotated = l_shape().rotated_clockwise();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        let occupied: Vec<(u32, u32)> = rotated.occupied().map(|(c, r, _)| (c, r)).collect();
        assert_eq!(occupied, vec![(0, 0), (1, 0), (1, 1), (1, 2)]);
    }

    #[test]
    fn four_rotations_restore_the_shape() {
        let shape = l_shape();
        let turned = shape
            .rotated_clockwise()
            .rotated_clockwise()
            .rotated_clockwise()
            .rotated_clockwise();
        assert_eq!(turned, shape);
    }

    #[test]
    fn piece_cells_are_offset_by_origin() {
        let piece = Piece::new(l_shape(), 4, -1);
        let cells: Vec<(i32, i32)> = piece.cells().map(|(c, r, _)| (c, r)).collect();
        assert_eq!(cells, vec![(4, -1), (5, -1), (6, -1), (4, 0)]);
        assert_eq!(piece.rotated_clockwise().rotation(), 1);
    }

    #[test]
    fn spawned_piece_is_centred() {
        let piece = Piece::spawned(l_shape(), 10);
        assert_eq!((piece.column(), piece.row()), (4, 0));
    }

    #[test]
    fn numeric_accessors_ignore_other_kinds() {
        assert_eq!(Cell::numeric(16).numeric_value(), Some(16));
        assert_eq!(Cell::color(2).numeric_value(), None);
        assert!(Cell::default().is_empty());
        assert!(Cell::marker().is_occupied());
    }
}
