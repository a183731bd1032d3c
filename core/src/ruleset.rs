//! Declarative rulesets describing one game variant.
//!
//! A [`Ruleset`] bundles the grid dimensions, the weighted shape table, the
//! ordered cascade passes and the pacing parameters. Rulesets are plain data so
//! adapters can load them from configuration files and several independent
//! engines can run side by side.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Cell, CellKind};

/// Names of the rulesets shipped with the engine.
pub const BUILTIN_RULESETS: [&str; 5] = ["tetris", "puyo", "tetorisu", "merge", "hands"];

const TETROMINOES: [(&str, &[&str]); 7] = [
    ("I", &["####"]),
    ("O", &["##", "##"]),
    ("T", &["###", ".#."]),
    ("L", &["###", "#.."]),
    ("J", &["###", "..#"]),
    ("S", &[".##", "##."]),
    ("Z", &["##.", ".##"]),
];

/// Complete description of one game variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    /// Human readable name of the variant.
    pub name: String,
    /// Number of grid columns.
    pub width: u32,
    /// Number of grid rows.
    pub height: u32,
    /// Number of distinct colours available to coloured cells.
    pub palette_size: u8,
    /// Rows that must be cleared to advance one level.
    pub lines_per_level: u32,
    /// Numeric value that triggers the win overlay, if the variant has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_value: Option<u32>,
    /// Auto-fall pacing.
    #[serde(default)]
    pub fall: FallTuning,
    /// Cascade passes in execution order.
    pub passes: Vec<RulePassSpec>,
    /// Weighted table of spawnable shapes.
    pub shapes: Vec<ShapeEntry>,
}

impl Ruleset {
    /// Classic row-clearing tetromino game.
    #[must_use]
    pub fn tetris() -> Self {
        let shapes = TETROMINOES
            .iter()
            .zip(0u8..)
            .map(|((name, rows), color)| ShapeEntry::new(name, 1, rows, ShapeFill::Color { color }))
            .collect();
        Self {
            name: "tetris".to_owned(),
            width: 10,
            height: 20,
            palette_size: 7,
            lines_per_level: 10,
            win_value: None,
            fall: FallTuning::default(),
            passes: vec![RulePassSpec::FullRowClear {
                points_per_value: 0,
            }],
            shapes,
        }
    }

    /// Colour-matching pairs where four connected cells disappear.
    #[must_use]
    pub fn puyo() -> Self {
        Self {
            name: "puyo".to_owned(),
            width: 6,
            height: 12,
            palette_size: 5,
            lines_per_level: 10,
            win_value: None,
            fall: FallTuning::default(),
            passes: vec![
                RulePassSpec::ConnectivityMatch {
                    matcher: Matcher::SameColor,
                    min_size: 4,
                    effect: MatchEffect::Clear,
                    points_per_cell: 10,
                },
                RulePassSpec::GravityCompact,
            ],
            shapes: vec![ShapeEntry::new("pair", 1, &["#", "#"], ShapeFill::RandomColor)],
        }
    }

    /// Hybrid where colour matches become numeric tiles that merge by value.
    #[must_use]
    pub fn tetorisu() -> Self {
        let mut shapes: Vec<ShapeEntry> = TETROMINOES
            .iter()
            .map(|(name, rows)| ShapeEntry::new(name, 4, rows, ShapeFill::RandomColor))
            .collect();
        shapes.extend([
            ShapeEntry::new("hand", 3, &["#"], ShapeFill::Numeric { value: 2 }),
            ShapeEntry::new("hand-pair", 2, &["##"], ShapeFill::Numeric { value: 2 }),
            ShapeEntry::new("hand-trio", 2, &["###"], ShapeFill::Numeric { value: 2 }),
        ]);
        Self {
            name: "tetorisu".to_owned(),
            width: 10,
            height: 20,
            palette_size: 5,
            lines_per_level: 10,
            win_value: None,
            fall: FallTuning::default(),
            passes: vec![
                RulePassSpec::ConnectivityMatch {
                    matcher: Matcher::SameColor,
                    min_size: 4,
                    effect: MatchEffect::Transform { value: 2 },
                    points_per_cell: 10,
                },
                RulePassSpec::NumericMerge,
                RulePassSpec::GravityCompact,
                RulePassSpec::FullRowClear {
                    points_per_value: 0,
                },
            ],
            shapes,
        }
    }

    /// Falling numeric tiles that merge by value until 2048 appears.
    #[must_use]
    pub fn merge() -> Self {
        Self {
            name: "merge".to_owned(),
            width: 10,
            height: 20,
            palette_size: 1,
            lines_per_level: 10,
            win_value: Some(2048),
            fall: FallTuning::default(),
            passes: vec![
                RulePassSpec::NumericMerge,
                RulePassSpec::GravityCompact,
                RulePassSpec::FullRowClear {
                    points_per_value: 0,
                },
            ],
            shapes: vec![
                ShapeEntry::new("two", 6, &["#"], ShapeFill::Numeric { value: 2 }),
                ShapeEntry::new("four", 2, &["#"], ShapeFill::Numeric { value: 4 }),
                ShapeEntry::new("domino", 3, &["##"], ShapeFill::Numeric { value: 2 }),
                ShapeEntry::new("bar", 1, &["###"], ShapeFill::Numeric { value: 2 }),
            ],
        }
    }

    /// Hand markers vanish in groups of four while numeric blocks fill rows.
    ///
    /// Cleared rows pay out the values they carry, and the rare high-value
    /// shapes only appear from level three on.
    #[must_use]
    pub fn hands() -> Self {
        Self {
            name: "hands".to_owned(),
            width: 8,
            height: 16,
            palette_size: 1,
            lines_per_level: 5,
            win_value: None,
            fall: FallTuning::default(),
            passes: vec![
                RulePassSpec::ConnectivityMatch {
                    matcher: Matcher::UnitMarker,
                    min_size: 4,
                    effect: MatchEffect::Clear,
                    points_per_cell: 50,
                },
                RulePassSpec::GravityCompact,
                RulePassSpec::FullRowClear {
                    points_per_value: 10,
                },
            ],
            shapes: vec![
                ShapeEntry::new("hand-pair", 3, &["##"], ShapeFill::Marker),
                ShapeEntry::new("hand-trio", 2, &["###"], ShapeFill::Marker),
                ShapeEntry::new("hand-quad", 1, &["##", "##"], ShapeFill::Marker),
                ShapeEntry::new("hand-t", 1, &[".#.", "###"], ShapeFill::Marker),
                ShapeEntry::new("squirrel", 2, &["#"], ShapeFill::Numeric { value: 1 }),
                ShapeEntry::new("nut", 2, &["#"], ShapeFill::Numeric { value: 2 }),
                ShapeEntry::new("pair", 1, &["#", "#"], ShapeFill::Numeric { value: 4 }),
                ShapeEntry::new("rare-eight", 1, &["#"], ShapeFill::Numeric { value: 8 })
                    .unlocked_at(3),
                ShapeEntry::new("rare-pair", 1, &["##"], ShapeFill::Numeric { value: 4 })
                    .unlocked_at(3),
            ],
        }
    }

    /// Looks up a built-in ruleset by name.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "tetris" => Some(Self::tetris()),
            "puyo" => Some(Self::puyo()),
            "tetorisu" => Some(Self::tetorisu()),
            "merge" => Some(Self::merge()),
            "hands" => Some(Self::hands()),
            _ => None,
        }
    }

    /// Checks the ruleset for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), RulesetError> {
        if self.width == 0 || self.height == 0 {
            return Err(RulesetError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.palette_size == 0 {
            return Err(RulesetError::EmptyPalette);
        }
        if self.lines_per_level == 0 {
            return Err(RulesetError::ZeroLinesPerLevel);
        }
        if self.shapes.is_empty() {
            return Err(RulesetError::NoShapes);
        }
        if self
            .shapes
            .iter()
            .all(|entry| entry.weight == 0 || !entry.available_at(1))
        {
            return Err(RulesetError::ZeroTotalWeight);
        }
        for entry in &self.shapes {
            let mask = entry.mask()?;
            if mask.width() > self.width {
                return Err(RulesetError::ShapeTooWide {
                    name: entry.name.clone(),
                });
            }
            if let ShapeFill::Color { color } = entry.fill {
                if color >= self.palette_size {
                    return Err(RulesetError::ColorOutOfPalette {
                        name: entry.name.clone(),
                        color,
                    });
                }
            }
        }
        for pass in &self.passes {
            if let RulePassSpec::ConnectivityMatch { min_size: 0, .. } = pass {
                return Err(RulesetError::ZeroMatchSize);
            }
        }
        Ok(())
    }
}

/// Serializable description of one cascade pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pass", rename_all = "snake_case")]
pub enum RulePassSpec {
    /// Applies an effect to connected components of matching cells.
    ConnectivityMatch {
        /// Which cells belong to the same component.
        matcher: Matcher,
        /// Smallest component size that triggers the effect.
        min_size: u32,
        /// Effect applied to every member of a qualifying component.
        effect: MatchEffect,
        /// Points awarded per affected cell before the chain multiplier.
        points_per_cell: u64,
    },
    /// Merges adjacent equal numeric cells into one cell of double value.
    NumericMerge,
    /// Slides occupied cells down each column.
    GravityCompact,
    /// Removes rows whose cells are all occupied.
    FullRowClear {
        /// Points per unit of numeric value carried by a removed row.
        #[serde(default)]
        points_per_value: u64,
    },
}

impl RulePassSpec {
    /// Kind of pass described by the spec.
    #[must_use]
    pub const fn kind(&self) -> RulePassKind {
        match self {
            Self::ConnectivityMatch { .. } => RulePassKind::ConnectivityMatch,
            Self::NumericMerge => RulePassKind::NumericMerge,
            Self::GravityCompact => RulePassKind::GravityCompact,
            Self::FullRowClear { .. } => RulePassKind::FullRowClear,
        }
    }
}

/// Identifies a rule pass in events and observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulePassKind {
    /// Connected-component matching.
    ConnectivityMatch,
    /// Equal-value numeric merging.
    NumericMerge,
    /// Column gravity compaction.
    GravityCompact,
    /// Full-row removal.
    FullRowClear,
}

impl RulePassKind {
    /// Reports whether the pass only settles cells without scoring.
    #[must_use]
    pub const fn is_gravity(self) -> bool {
        matches!(self, Self::GravityCompact)
    }
}

/// Predicate selecting which cells join a connected component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    /// Coloured cells sharing the anchor's colour.
    SameColor,
    /// Unit marker cells.
    UnitMarker,
}

impl Matcher {
    /// Reports whether the cell can anchor a component.
    #[must_use]
    pub fn accepts(self, cell: Cell) -> bool {
        match (self, cell.kind()) {
            (Self::SameColor, Some(CellKind::Color(_))) => true,
            (Self::UnitMarker, Some(CellKind::Marker)) => true,
            _ => false,
        }
    }

    /// Reports whether `cell` belongs to the component anchored at `anchor`.
    #[must_use]
    pub fn connects(self, anchor: Cell, cell: Cell) -> bool {
        match self {
            Self::SameColor => self.accepts(cell) && anchor == cell,
            Self::UnitMarker => self.accepts(cell),
        }
    }
}

/// Effect applied to the cells of a qualifying component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchEffect {
    /// Members become empty.
    Clear,
    /// Members become numeric cells of the given value.
    Transform {
        /// Value assigned to every transformed cell.
        value: u32,
    },
}

/// Weighted entry of the shape table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeEntry {
    /// Name shown in diagnostics.
    pub name: String,
    /// Relative draw weight.
    pub weight: u32,
    /// First level at which the shape can be drawn.
    #[serde(default = "first_level")]
    pub min_level: u32,
    /// Mask rows from top to bottom; `#` marks an occupied sub-cell.
    pub rows: Vec<String>,
    /// Payload assigned to occupied sub-cells.
    pub fill: ShapeFill,
}

impl ShapeEntry {
    /// Creates a shape entry from mask rows.
    #[must_use]
    pub fn new(name: &str, weight: u32, rows: &[&str], fill: ShapeFill) -> Self {
        Self {
            name: name.to_owned(),
            weight,
            min_level: first_level(),
            rows: rows.iter().map(|row| (*row).to_owned()).collect(),
            fill,
        }
    }

    /// Keeps the shape out of the draw below `level`.
    #[must_use]
    pub fn unlocked_at(mut self, level: u32) -> Self {
        self.min_level = level;
        self
    }

    /// Reports whether the shape can be drawn at `level`.
    #[must_use]
    pub const fn available_at(&self, level: u32) -> bool {
        self.min_level <= level
    }

    /// Parses the mask rows.
    pub fn mask(&self) -> Result<ShapeMask, RulesetError> {
        let invalid = || RulesetError::InvalidMask {
            name: self.name.clone(),
        };
        let width = self.rows.first().map(|row| row.chars().count()).ok_or_else(invalid)?;
        let mut cells = Vec::with_capacity(width * self.rows.len());
        for row in &self.rows {
            if row.chars().count() != width {
                return Err(invalid());
            }
            for symbol in row.chars() {
                match symbol {
                    '#' => cells.push(true),
                    '.' | ' ' => cells.push(false),
                    _ => return Err(invalid()),
                }
            }
        }
        if width == 0 || !cells.iter().any(|occupied| *occupied) {
            return Err(invalid());
        }
        let width = u32::try_from(width).map_err(|_| invalid())?;
        let height = u32::try_from(self.rows.len()).map_err(|_| invalid())?;
        Ok(ShapeMask {
            width,
            height,
            cells,
        })
    }
}

const fn first_level() -> u32 {
    1
}

/// Parsed occupancy mask of a shape entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl ShapeMask {
    /// Number of mask columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of mask rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Row-major occupancy flags.
    #[must_use]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }
}

/// Payload rule for the sub-cells of a spawned shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeFill {
    /// Every sub-cell uses the same colour.
    Color {
        /// Palette index.
        color: u8,
    },
    /// Every sub-cell draws its own colour from the palette.
    RandomColor,
    /// Every sub-cell is a numeric tile.
    Numeric {
        /// Value of the tiles.
        value: u32,
    },
    /// Every sub-cell is a unit marker.
    Marker,
}

/// Auto-fall interval curve: `max(min, base - (level - 1) * step)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallTuning {
    /// Interval at level one, in milliseconds.
    pub base_interval_ms: u64,
    /// Reduction per level, in milliseconds.
    pub level_step_ms: u64,
    /// Lower bound of the interval, in milliseconds.
    pub min_interval_ms: u64,
}

impl FallTuning {
    /// Interval between auto-fall attempts at the provided level.
    #[must_use]
    pub fn interval_for_level(&self, level: u32) -> Duration {
        let reduction = self
            .level_step_ms
            .saturating_mul(u64::from(level.saturating_sub(1)));
        let millis = self
            .base_interval_ms
            .saturating_sub(reduction)
            .max(self.min_interval_ms);
        Duration::from_millis(millis)
    }
}

impl Default for FallTuning {
    fn default() -> Self {
        Self {
            base_interval_ms: 500,
            level_step_ms: 50,
            min_interval_ms: 100,
        }
    }
}

/// Reasons a ruleset cannot be used.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RulesetError {
    /// One of the grid dimensions is zero.
    #[error("grid must have non-zero dimensions, got {width}x{height}")]
    EmptyGrid {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },
    /// The palette has no colours.
    #[error("palette must contain at least one colour")]
    EmptyPalette,
    /// Levels would never advance.
    #[error("lines_per_level must be at least one")]
    ZeroLinesPerLevel,
    /// The shape table is empty.
    #[error("shape table is empty")]
    NoShapes,
    /// Every shape has zero weight.
    #[error("shape table weights sum to zero")]
    ZeroTotalWeight,
    /// A shape mask is empty, ragged or contains unknown symbols.
    #[error("shape `{name}` has an invalid mask")]
    InvalidMask {
        /// Name of the offending shape.
        name: String,
    },
    /// A shape does not fit the grid width.
    #[error("shape `{name}` is wider than the grid")]
    ShapeTooWide {
        /// Name of the offending shape.
        name: String,
    },
    /// A fixed colour lies outside the palette.
    #[error("shape `{name}` uses colour {color} outside the palette")]
    ColorOutOfPalette {
        /// Name of the offending shape.
        name: String,
        /// Offending colour index.
        color: u8,
    },
    /// A connectivity pass would fire on empty components.
    #[error("connectivity matches need a minimum size of at least one")]
    ZeroMatchSize,
}
