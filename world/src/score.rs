//! Score, level and chain bookkeeping for one game.

/// Running totals of a single game. The score never decreases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreKeeper {
    score: u64,
    lines_cleared: u64,
    lines_per_level: u32,
    max_chain: u32,
    last_chain: u32,
    max_value: u32,
    cells_cleared: u64,
}

impl ScoreKeeper {
    /// Creates a zeroed keeper that advances one level every `lines_per_level` rows.
    #[must_use]
    pub fn new(lines_per_level: u32) -> Self {
        Self {
            score: 0,
            lines_cleared: 0,
            lines_per_level: lines_per_level.max(1),
            max_chain: 0,
            last_chain: 0,
            max_value: 0,
            cells_cleared: 0,
        }
    }

    /// Accumulated score.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Total rows removed.
    #[must_use]
    pub const fn lines_cleared(&self) -> u64 {
        self.lines_cleared
    }

    /// One-based level derived from the cleared rows.
    #[must_use]
    pub fn level(&self) -> u32 {
        let level = self.lines_cleared / u64::from(self.lines_per_level) + 1;
        u32::try_from(level).unwrap_or(u32::MAX)
    }

    /// Longest chain of the game.
    #[must_use]
    pub const fn max_chain(&self) -> u32 {
        self.max_chain
    }

    /// Chain produced by the most recent cascade.
    #[must_use]
    pub const fn last_chain(&self) -> u32 {
        self.last_chain
    }

    /// Largest numeric value seen on the grid.
    #[must_use]
    pub const fn max_value(&self) -> u32 {
        self.max_value
    }

    /// Cells removed or transformed by connectivity matches.
    #[must_use]
    pub const fn cells_cleared(&self) -> u64 {
        self.cells_cleared
    }

    pub(crate) fn add_points(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }

    pub(crate) fn record_rows(&mut self, rows: u32) {
        self.lines_cleared = self.lines_cleared.saturating_add(u64::from(rows));
    }

    pub(crate) fn record_cells(&mut self, cells: u64) {
        self.cells_cleared = self.cells_cleared.saturating_add(cells);
    }

    pub(crate) fn record_chain(&mut self, chain: u32) {
        self.last_chain = chain;
        self.max_chain = self.max_chain.max(chain);
    }

    pub(crate) fn observe_value(&mut self, value: u32) {
        self.max_value = self.max_value.max(value);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.lines_per_level);
    }
}
