//! Cascade resolution: ordered rule passes applied until the grid settles.

use std::fmt::Debug;

use cascade_core::{Cell, Event, MatchEffect, Matcher, RulePassKind, RulePassSpec};

use crate::{grid::Grid, score::ScoreKeeper};

/// Changes produced by one application of a rule pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Whether the pass changed the grid.
    pub fired: bool,
    /// Base points before the chain multiplier.
    pub score: u64,
    /// Cells removed or transformed by connectivity matches.
    pub cells_cleared: u64,
    /// Full rows removed.
    pub rows_cleared: u32,
    /// Largest numeric value the pass wrote, or zero.
    pub peak_value: u32,
}

/// Grid transformation executed by the cascade resolver.
pub trait RulePass: Debug {
    /// Kind reported in events.
    fn kind(&self) -> RulePassKind;

    /// Applies the pass once, mutating the grid in place.
    fn apply(&self, grid: &mut Grid) -> PassOutcome;
}

/// Applies an effect to connected components of matching cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectivityMatch {
    matcher: Matcher,
    min_size: u32,
    effect: MatchEffect,
    points_per_cell: u64,
}

impl ConnectivityMatch {
    /// Creates the pass.
    #[must_use]
    pub const fn new(
        matcher: Matcher,
        min_size: u32,
        effect: MatchEffect,
        points_per_cell: u64,
    ) -> Self {
        Self {
            matcher,
            min_size,
            effect,
            points_per_cell,
        }
    }
}

impl RulePass for ConnectivityMatch {
    fn kind(&self) -> RulePassKind {
        RulePassKind::ConnectivityMatch
    }

    fn apply(&self, grid: &mut Grid) -> PassOutcome {
        let width = usize::try_from(grid.width()).unwrap_or(0);
        let height = usize::try_from(grid.height()).unwrap_or(0);
        let min_size = usize::try_from(self.min_size).unwrap_or(usize::MAX).max(1);
        let cells = grid.cells_mut();
        let mut visited = vec![false; cells.len()];
        let mut stack: Vec<usize> = Vec::new();
        let mut component: Vec<usize> = Vec::new();
        let mut matched: Vec<usize> = Vec::new();

        for start in 0..cells.len() {
            if visited[start] {
                continue;
            }
            visited[start] = true;
            let anchor = cells[start];
            if !self.matcher.accepts(anchor) {
                continue;
            }

            component.clear();
            stack.push(start);
            while let Some(index) = stack.pop() {
                component.push(index);
                let column = index % width;
                let row = index / width;
                let neighbours = [
                    (column > 0).then(|| index - 1),
                    (column + 1 < width).then(|| index + 1),
                    (row > 0).then(|| index - width),
                    (row + 1 < height).then(|| index + width),
                ];
                for neighbour in neighbours.into_iter().flatten() {
                    if !visited[neighbour] && self.matcher.connects(anchor, cells[neighbour]) {
                        visited[neighbour] = true;
                        stack.push(neighbour);
                    }
                }
            }

            if component.len() >= min_size {
                matched.extend_from_slice(&component);
            }
        }

        if matched.is_empty() {
            return PassOutcome::default();
        }

        let (replacement, peak_value) = match self.effect {
            MatchEffect::Clear => (Cell::Empty, 0),
            MatchEffect::Transform { value } => (Cell::numeric(value), value),
        };
        for index in &matched {
            cells[*index] = replacement;
        }

        let count = u64::try_from(matched.len()).unwrap_or(u64::MAX);
        PassOutcome {
            fired: true,
            score: self.points_per_cell.saturating_mul(count),
            cells_cleared: count,
            rows_cleared: 0,
            peak_value,
        }
    }
}

/// Merges equal adjacent numeric cells, first along rows and then along columns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NumericMerge;

impl RulePass for NumericMerge {
    fn kind(&self) -> RulePassKind {
        RulePassKind::NumericMerge
    }

    fn apply(&self, grid: &mut Grid) -> PassOutcome {
        let width = usize::try_from(grid.width()).unwrap_or(0);
        let height = usize::try_from(grid.height()).unwrap_or(0);
        let cells = grid.cells_mut();
        let mut touched = vec![false; cells.len()];
        let mut fired = false;
        let mut score = 0u64;
        let mut peak_value = 0u32;

        let horizontal = (0..height).flat_map(|row| {
            (0..width.saturating_sub(1)).map(move |column| (row * width + column, 1))
        });
        let vertical = (0..height.saturating_sub(1))
            .flat_map(|row| (0..width).map(move |column| (row * width + column, width)));

        for (first, step) in horizontal.chain(vertical) {
            let second = first + step;
            if touched[first] || touched[second] {
                continue;
            }
            let (Some(left), Some(right)) =
                (cells[first].numeric_value(), cells[second].numeric_value())
            else {
                continue;
            };
            if left != right {
                continue;
            }
            let Some(merged) = left.checked_mul(2) else {
                continue;
            };
            cells[first] = Cell::numeric(merged);
            cells[second] = Cell::Empty;
            touched[first] = true;
            touched[second] = true;
            fired = true;
            score = score.saturating_add(u64::from(merged));
            peak_value = peak_value.max(merged);
        }

        PassOutcome {
            fired,
            score,
            cells_cleared: 0,
            rows_cleared: 0,
            peak_value,
        }
    }
}

/// Lets occupied cells fall to the bottom of their column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GravityCompact;

impl RulePass for GravityCompact {
    fn kind(&self) -> RulePassKind {
        RulePassKind::GravityCompact
    }

    fn apply(&self, grid: &mut Grid) -> PassOutcome {
        PassOutcome {
            fired: grid.compact_columns_gravity(),
            ..PassOutcome::default()
        }
    }
}

/// Removes every full row, scoring `100 × k²` for `k` rows.
///
/// With a non-zero `points_per_value`, each removed row also pays for the
/// numeric cells it carries: every unit of value earns `points_per_value`, and
/// every pair of equal values adds their merged value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FullRowClear {
    points_per_value: u64,
}

impl FullRowClear {
    /// Creates the pass.
    #[must_use]
    pub const fn new(points_per_value: u64) -> Self {
        Self { points_per_value }
    }

    fn payload(&self, row: &[Cell]) -> u64 {
        if self.points_per_value == 0 {
            return 0;
        }
        let mut values: Vec<u32> = row.iter().filter_map(|cell| cell.numeric_value()).collect();
        values.sort_unstable();
        let total: u64 = values.iter().map(|value| u64::from(*value)).sum();

        let mut bonus = 0u64;
        let mut index = 0;
        while index + 1 < values.len() {
            if values[index] == values[index + 1] {
                bonus = bonus.saturating_add(u64::from(values[index]) * 2);
                index += 2;
            } else {
                index += 1;
            }
        }
        total
            .saturating_mul(self.points_per_value)
            .saturating_add(bonus)
    }
}

impl RulePass for FullRowClear {
    fn kind(&self) -> RulePassKind {
        RulePassKind::FullRowClear
    }

    fn apply(&self, grid: &mut Grid) -> PassOutcome {
        if grid.width() == 0 {
            return PassOutcome::default();
        }
        let mut cleared = 0u32;
        let mut payload = 0u64;
        let mut row = grid.height();
        while row > 0 {
            match grid.is_row_full(row - 1) {
                Ok(true) => {
                    if let Ok(cells) = grid.row(row - 1) {
                        payload = payload.saturating_add(self.payload(cells));
                    }
                    let result = grid.clear_row(row - 1);
                    debug_assert!(result.is_ok(), "row {} vanished", row - 1);
                    cleared += 1;
                }
                Ok(false) => row -= 1,
                Err(_) => break,
            }
        }
        let rows = u64::from(cleared);
        PassOutcome {
            fired: cleared > 0,
            score: (100 * rows * rows).saturating_add(payload),
            cells_cleared: 0,
            rows_cleared: cleared,
            peak_value: 0,
        }
    }
}

/// Builds the executable pass described by a ruleset entry.
#[must_use]
pub fn instantiate(spec: &RulePassSpec) -> Box<dyn RulePass> {
    match *spec {
        RulePassSpec::ConnectivityMatch {
            matcher,
            min_size,
            effect,
            points_per_cell,
        } => Box::new(ConnectivityMatch::new(
            matcher,
            min_size,
            effect,
            points_per_cell,
        )),
        RulePassSpec::NumericMerge => Box::new(NumericMerge),
        RulePassSpec::GravityCompact => Box::new(GravityCompact),
        RulePassSpec::FullRowClear { points_per_value } => {
            Box::new(FullRowClear::new(points_per_value))
        }
    }
}

/// Callback invoked after every scoring iteration of a cascade.
pub trait ChainObserver {
    /// Receives the settled grid and the one-based chain index.
    fn on_chain_step(&mut self, grid: &Grid, chain: u32);
}

/// Observer that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreChainSteps;

impl ChainObserver for IgnoreChainSteps {
    fn on_chain_step(&mut self, _grid: &Grid, _chain: u32) {}
}

/// Totals of one cascade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChainState {
    /// Number of scoring iterations.
    pub chain: u32,
    /// Points credited, multipliers included.
    pub score_delta: u64,
    /// Rows removed.
    pub rows_cleared: u32,
    /// Cells removed or transformed by connectivity matches.
    pub cells_cleared: u64,
    /// Largest numeric value written by any pass, even if a later pass removed it.
    pub peak_value: u32,
}

/// Runs the ordered rule passes of a ruleset until none of them fires.
#[derive(Debug)]
pub struct CascadeResolver {
    passes: Vec<Box<dyn RulePass>>,
}

impl CascadeResolver {
    /// Creates a resolver from already instantiated passes.
    #[must_use]
    pub fn new(passes: Vec<Box<dyn RulePass>>) -> Self {
        Self { passes }
    }

    /// Creates a resolver from ruleset pass descriptions.
    #[must_use]
    pub fn from_specs(specs: &[RulePassSpec]) -> Self {
        Self::new(specs.iter().map(instantiate).collect())
    }

    /// Kinds of the configured passes in execution order.
    pub fn kinds(&self) -> impl Iterator<Item = RulePassKind> + '_ {
        self.passes.iter().map(|pass| pass.kind())
    }

    /// Resolves the grid to a fixpoint.
    ///
    /// Points of every pass are multiplied by `chain + 1`. The chain advances
    /// once per iteration in which a non-gravity pass fired.
    pub fn run(
        &self,
        grid: &mut Grid,
        score: &mut ScoreKeeper,
        observer: &mut dyn ChainObserver,
        out_events: &mut Vec<Event>,
    ) -> ChainState {
        let mut state = ChainState::default();
        let iteration_cap = grid.cells().len().saturating_mul(4).max(16);
        let mut iterations = 0usize;

        loop {
            let multiplier = state.chain.saturating_add(1);
            let mut any_fired = false;
            let mut scoring_fired = false;

            for pass in &self.passes {
                let outcome = pass.apply(grid);
                if !outcome.fired {
                    continue;
                }
                any_fired = true;
                scoring_fired |= !pass.kind().is_gravity();

                let points = outcome.score.saturating_mul(u64::from(multiplier));
                score.add_points(points);
                score.record_cells(outcome.cells_cleared);
                state.score_delta = state.score_delta.saturating_add(points);
                state.cells_cleared = state.cells_cleared.saturating_add(outcome.cells_cleared);
                state.peak_value = state.peak_value.max(outcome.peak_value);
                score.observe_value(outcome.peak_value);
                out_events.push(Event::RulePassFired {
                    pass: pass.kind(),
                    multiplier,
                    points,
                });

                if outcome.rows_cleared > 0 {
                    score.record_rows(outcome.rows_cleared);
                    state.rows_cleared = state.rows_cleared.saturating_add(outcome.rows_cleared);
                    out_events.push(Event::RowsCleared {
                        rows: outcome.rows_cleared,
                        total: score.lines_cleared(),
                    });
                }
            }

            if scoring_fired {
                state.chain = state.chain.saturating_add(1);
                out_events.push(Event::ChainStep { chain: state.chain });
                observer.on_chain_step(grid, state.chain);
            }

            if !any_fired {
                break;
            }
            iterations += 1;
            debug_assert!(
                iterations <= iteration_cap,
                "cascade failed to settle after {iterations} iterations"
            );
        }

        score.record_chain(state.chain);
        score.observe_value(grid.max_numeric());
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{CellCoord, Ruleset};

    fn grid_from_rows(rows: &[&str]) -> Grid {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let cells = rows
            .iter()
            .flat_map(|row| row.chars())
            .map(|symbol| match symbol {
                '.' => Cell::Empty,
                'm' => Cell::marker(),
                digit if digit.is_ascii_digit() => Cell::color(digit as u8 - b'0'),
                other => Cell::numeric(u32::from(other as u8 - b'a' + 1) * 2),
            })
            .collect();
        Grid::from_cells(width, height, cells).expect("rectangular rows")
    }

    #[derive(Default)]
    struct Recorder {
        steps: Vec<(u32, usize)>,
    }

    impl ChainObserver for Recorder {
        fn on_chain_step(&mut self, grid: &Grid, chain: u32) {
            self.steps.push((chain, grid.occupied_count()));
        }
    }

    fn same_color_clear() -> ConnectivityMatch {
        ConnectivityMatch::new(Matcher::SameColor, 4, MatchEffect::Clear, 10)
    }

    #[test]
    fn l_shaped_component_is_cleared() {
        let mut grid = grid_from_rows(&["1...", "1...", "11..", "2222"]);
        let outcome = same_color_clear().apply(&mut grid);
        assert!(outcome.fired);
        assert_eq!(outcome.cells_cleared, 8);
        assert_eq!(outcome.score, 80);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn only_the_connected_component_is_cleared() {
        let mut grid = grid_from_rows(&["1.1.", "1..1", "11.2", "2211"]);
        let outcome = same_color_clear().apply(&mut grid);
        assert_eq!(outcome.cells_cleared, 4);
        assert_eq!(outcome.score, 40);
        let expected = grid_from_rows(&["..1.", "...1", "...2", "2211"]);
        assert_eq!(grid.cells(), expected.cells());
    }

    #[test]
    fn three_cells_do_not_clear() {
        let mut grid = grid_from_rows(&["1..", "11.", "222"]);
        let outcome = same_color_clear().apply(&mut grid);
        assert!(!outcome.fired);
        assert_eq!(grid.occupied_count(), 6);
    }

    #[test]
    fn transform_turns_matches_into_numeric_cells() {
        let mut grid = grid_from_rows(&["33..", "33.."]);
        let pass = ConnectivityMatch::new(
            Matcher::SameColor,
            4,
            MatchEffect::Transform { value: 2 },
            10,
        );
        let outcome = pass.apply(&mut grid);
        assert_eq!(outcome.score, 40);
        assert_eq!(outcome.peak_value, 2);
        assert_eq!(grid.numeric_sum(), 8);
        assert!(!pass.apply(&mut grid).fired);
    }

    #[test]
    fn markers_connect_regardless_of_payload() {
        let mut grid = grid_from_rows(&["mm..", ".mm."]);
        let pass = ConnectivityMatch::new(Matcher::UnitMarker, 4, MatchEffect::Clear, 50);
        assert_eq!(pass.apply(&mut grid).score, 200);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn merges_do_not_reuse_produced_cells() {
        let mut grid = grid_from_rows(&["aaa."]);
        let outcome = NumericMerge.apply(&mut grid);
        assert_eq!(outcome.score, 4);
        assert_eq!(
            grid.cells(),
            &[Cell::numeric(4), Cell::Empty, Cell::numeric(2), Cell::Empty]
        );
    }

    #[test]
    fn horizontal_merge_wins_over_vertical() {
        let mut grid = grid_from_rows(&["aa", "a."]);
        let outcome = NumericMerge.apply(&mut grid);
        assert_eq!(outcome.score, 4);
        assert_eq!(outcome.peak_value, 4);
        assert_eq!(
            grid.cells(),
            &[Cell::numeric(4), Cell::Empty, Cell::numeric(2), Cell::Empty]
        );
    }

    #[test]
    fn vertical_merge_keeps_the_upper_cell() {
        let mut grid = grid_from_rows(&["b", "b"]);
        assert_eq!(NumericMerge.apply(&mut grid).score, 8);
        assert_eq!(grid.cells(), &[Cell::numeric(8), Cell::Empty]);
    }

    #[test]
    fn values_cleared_later_in_the_cascade_are_still_observed() {
        let resolver = CascadeResolver::from_specs(&Ruleset::merge().passes);
        let mut grid = grid_from_rows(&["h.", "hd"]);
        let mut score = ScoreKeeper::new(10);
        let mut events = Vec::new();

        let state = resolver.run(&mut grid, &mut score, &mut IgnoreChainSteps, &mut events);

        assert_eq!(grid.occupied_count(), 0);
        assert_eq!(state.rows_cleared, 1);
        assert_eq!(state.peak_value, 32);
        assert_eq!(score.max_value(), 32);
    }

    #[test]
    fn full_rows_score_quadratically() {
        let mut grid = grid_from_rows(&["1...", "1111", "2222"]);
        let outcome = FullRowClear::default().apply(&mut grid);
        assert_eq!(outcome.rows_cleared, 2);
        assert_eq!(outcome.score, 400);
        assert_eq!(grid.get(CellCoord::new(0, 2)), Ok(Cell::color(1)));
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn cleared_rows_pay_for_their_values() {
        let pass = FullRowClear::new(10);
        let mut grid = grid_from_rows(&["mam", "aab", "m.."]);
        let outcome = pass.apply(&mut grid);
        assert_eq!(outcome.rows_cleared, 2);
        // Two rows: 400 base, (2 + 2 + 4) * 10 + 4 for the pair of twos, 2 * 10.
        assert_eq!(outcome.score, 400 + 84 + 20);
        assert_eq!(grid.occupied_count(), 1);

        let mut markers = grid_from_rows(&["mmm"]);
        assert_eq!(pass.apply(&mut markers).score, 100);
    }

    #[test]
    fn chain_multiplier_escalates_across_iterations() {
        let ruleset = Ruleset::puyo();
        let resolver = CascadeResolver::from_specs(&ruleset.passes);
        // Clearing the first group drops the upper pair onto the lower pair.
        let mut grid = grid_from_rows(&[
            "2.....", "2.....", "1.....", "1.....", "11....", "2.....", "2.....",
        ]);
        let mut score = ScoreKeeper::new(ruleset.lines_per_level);
        let mut recorder = Recorder::default();
        let mut events = Vec::new();

        let state = resolver.run(&mut grid, &mut score, &mut recorder, &mut events);

        assert_eq!(state.chain, 2);
        assert_eq!(state.score_delta, 40 + 40 * 2);
        assert_eq!(score.max_chain(), 2);
        assert_eq!(grid.occupied_count(), 0);
        assert_eq!(recorder.steps, vec![(1, 4), (2, 0)]);
        assert!(events.contains(&Event::RulePassFired {
            pass: RulePassKind::ConnectivityMatch,
            multiplier: 2,
            points: 80,
        }));
    }

    #[test]
    fn quiet_grid_reaches_fixpoint_without_chain() {
        let resolver = CascadeResolver::from_specs(&Ruleset::tetris().passes);
        let mut grid = grid_from_rows(&["....", "1..."]);
        let mut score = ScoreKeeper::new(10);
        let mut events = Vec::new();
        let state = resolver.run(&mut grid, &mut score, &mut IgnoreChainSteps, &mut events);
        assert_eq!(state, ChainState::default());
        assert!(events.is_empty());
        assert_eq!(score.last_chain(), 0);
    }
}
