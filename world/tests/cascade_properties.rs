use cascade_core::{Cell, MatchEffect, Matcher, Ruleset};
use cascade_world::{
    cascade::{ConnectivityMatch, NumericMerge},
    CascadeResolver, Grid, IgnoreChainSteps, RulePass, ScoreKeeper,
};
use proptest::prelude::*;

fn cell_strategy() -> impl Strategy<Value = Cell> {
    prop_oneof![
        3 => Just(Cell::Empty),
        2 => (0u8..3).prop_map(Cell::color),
        2 => (1u32..4).prop_map(|exponent| Cell::numeric(1 << exponent)),
        1 => Just(Cell::marker()),
    ]
}

fn grid_strategy() -> impl Strategy<Value = Grid> {
    (1u32..8, 1u32..12).prop_flat_map(|(width, height)| {
        prop::collection::vec(cell_strategy(), (width * height) as usize).prop_map(move |cells| {
            Grid::from_cells(width, height, cells).expect("generated cells match dimensions")
        })
    })
}

fn assert_settled(grid: &Grid) {
    let width = grid.width() as usize;
    let cells = grid.cells();
    for (index, cell) in cells.iter().enumerate() {
        if let Some(below) = cells.get(index + width) {
            assert!(
                cell.is_empty() || below.is_occupied(),
                "cell {index} floats above a gap"
            );
        }
    }
}

proptest! {
    #[test]
    fn gravity_is_idempotent(mut grid in grid_strategy()) {
        let occupied = grid.occupied_count();
        let _ = grid.compact_columns_gravity();
        assert_settled(&grid);
        let settled = grid.clone();
        prop_assert!(!grid.compact_columns_gravity());
        prop_assert_eq!(&grid, &settled);
        prop_assert_eq!(grid.occupied_count(), occupied);
    }

    #[test]
    fn merging_conserves_the_numeric_sum(mut grid in grid_strategy()) {
        let sum = grid.numeric_sum();
        let occupied = grid.occupied_count();
        let outcome = NumericMerge.apply(&mut grid);
        prop_assert_eq!(grid.numeric_sum(), sum);
        prop_assert_eq!(outcome.fired, grid.occupied_count() < occupied);
        prop_assert_eq!(outcome.score % 4, 0);
    }

    #[test]
    fn flood_clear_leaves_no_qualifying_component(mut grid in grid_strategy()) {
        let pass = ConnectivityMatch::new(Matcher::SameColor, 4, MatchEffect::Clear, 10);
        let before = grid.occupied_count() as u64;
        let outcome = pass.apply(&mut grid);
        prop_assert_eq!(grid.occupied_count() as u64, before - outcome.cells_cleared);
        prop_assert_eq!(outcome.score, outcome.cells_cleared * 10);
        prop_assert!(!pass.apply(&mut grid).fired);
    }

    #[test]
    fn resolver_stops_at_a_fixpoint(mut grid in grid_strategy()) {
        let ruleset = Ruleset::tetorisu();
        let resolver = CascadeResolver::from_specs(&ruleset.passes);
        let mut score = ScoreKeeper::new(ruleset.lines_per_level);
        let mut events = Vec::new();
        let state = resolver.run(&mut grid, &mut score, &mut IgnoreChainSteps, &mut events);

        prop_assert_eq!(score.score(), state.score_delta);
        prop_assert_eq!(score.max_chain(), state.chain);
        assert_settled(&grid);
        let settled = grid.clone();
        let mut replay = Vec::new();
        let again = resolver.run(&mut grid, &mut score, &mut IgnoreChainSteps, &mut replay);
        prop_assert_eq!(again.chain, 0);
        prop_assert!(replay.is_empty());
        prop_assert_eq!(grid, settled);
    }
}
