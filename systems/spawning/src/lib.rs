#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system responsible for emitting piece spawn commands.

use cascade_core::{
    CellKind, ColorTag, Command, Event, Piece, Ruleset, RulesetError, Shape, ShapeEntry, ShapeFill,
};
use rand::{distributions::Distribution, distributions::WeightedIndex, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Debug)]
pub struct Config {
    shapes: Vec<ShapeEntry>,
    palette_size: u8,
    grid_width: u32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration from a shape table, palette and seed.
    #[must_use]
    pub fn new(shapes: Vec<ShapeEntry>, palette_size: u8, grid_width: u32, rng_seed: u64) -> Self {
        Self {
            shapes,
            palette_size,
            grid_width,
            rng_seed,
        }
    }

    /// Creates a configuration matching the provided ruleset.
    #[must_use]
    pub fn from_ruleset(ruleset: &Ruleset, rng_seed: u64) -> Self {
        Self::new(
            ruleset.shapes.clone(),
            ruleset.palette_size,
            ruleset.width,
            rng_seed,
        )
    }
}

#[derive(Clone, Debug)]
struct Template {
    shape: Shape,
    fill: ShapeFill,
    weight: u32,
    min_level: u32,
}

/// Pure system that draws weighted shapes and answers spawn requests.
///
/// One piece of lookahead is kept so the world can display the upcoming piece.
/// Shapes with a minimum level stay out of the draw until the game reaches it.
#[derive(Debug)]
pub struct Spawning {
    templates: Vec<Template>,
    weights: WeightedIndex<u32>,
    level: u32,
    palette_size: u8,
    grid_width: u32,
    rng: ChaCha8Rng,
    lookahead: Option<Piece>,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    pub fn new(config: Config) -> Result<Self, RulesetError> {
        if config.shapes.is_empty() {
            return Err(RulesetError::NoShapes);
        }
        if config.palette_size == 0 {
            return Err(RulesetError::EmptyPalette);
        }

        let mut templates = Vec::with_capacity(config.shapes.len());
        for entry in &config.shapes {
            let mask = entry.mask()?;
            let placeholder = placeholder_kind(entry.fill);
            let cells = mask
                .cells()
                .iter()
                .map(|occupied| occupied.then_some(placeholder))
                .collect();
            let shape = Shape::from_cells(mask.width(), mask.height(), cells).ok_or_else(|| {
                RulesetError::InvalidMask {
                    name: entry.name.clone(),
                }
            })?;
            templates.push(Template {
                shape,
                fill: entry.fill,
                weight: entry.weight,
                min_level: entry.min_level,
            });
        }

        let weights = weights_at(&templates, FIRST_LEVEL)?;

        Ok(Self {
            templates,
            weights,
            level: FIRST_LEVEL,
            palette_size: config.palette_size,
            grid_width: config.grid_width,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            lookahead: None,
        })
    }

    /// Consumes events and emits a spawn command for every spawn request.
    ///
    /// `level` is the world's current level and decides which shapes are drawable.
    pub fn handle(&mut self, events: &[Event], level: u32, out: &mut Vec<Command>) {
        self.set_level(level);
        for event in events {
            let Event::SpawnRequested { fresh } = event else {
                continue;
            };
            if *fresh {
                self.lookahead = None;
            }
            let current = match self.lookahead.take() {
                Some(piece) => piece,
                None => self.draw(),
            };
            let next = self.draw();
            self.lookahead = Some(next.clone());
            out.push(Command::SpawnPiece { current, next });
        }
    }

    /// Restricts future draws to the shapes unlocked at `level`.
    pub fn set_level(&mut self, level: u32) {
        let level = level.max(FIRST_LEVEL);
        if level == self.level {
            return;
        }
        if let Ok(weights) = weights_at(&self.templates, level) {
            self.weights = weights;
            self.level = level;
        }
    }

    /// Upcoming piece that the next spawn request will install.
    #[must_use]
    pub fn peek(&self) -> Option<&Piece> {
        self.lookahead.as_ref()
    }

    /// Draws a new piece centred on the spawn row.
    pub fn draw(&mut self) -> Piece {
        let index = self.weights.sample(&mut self.rng);
        let template = &self.templates[index];
        let shape = match template.fill {
            ShapeFill::RandomColor => {
                let rng = &mut self.rng;
                let palette_size = self.palette_size;
                template
                    .shape
                    .map_kinds(|_| CellKind::Color(ColorTag::new(rng.gen_range(0..palette_size))))
            }
            ShapeFill::Color { .. } | ShapeFill::Numeric { .. } | ShapeFill::Marker => {
                template.shape.clone()
            }
        };
        Piece::spawned(shape, self.grid_width)
    }
}

const FIRST_LEVEL: u32 = 1;

fn weights_at(templates: &[Template], level: u32) -> Result<WeightedIndex<u32>, RulesetError> {
    WeightedIndex::new(templates.iter().map(|template| {
        if template.min_level <= level {
            template.weight
        } else {
            0
        }
    }))
    .map_err(|_| RulesetError::ZeroTotalWeight)
}

fn placeholder_kind(fill: ShapeFill) -> CellKind {
    match fill {
        ShapeFill::Color { color } => CellKind::Color(ColorTag::new(color)),
        ShapeFill::RandomColor => CellKind::Color(ColorTag::new(0)),
        ShapeFill::Numeric { value } => CellKind::Numeric(value),
        ShapeFill::Marker => CellKind::Marker,
    }
}
