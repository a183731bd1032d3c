//! Placement checks shared by translation, rotation, drops and spawns.

use cascade_core::Piece;

use crate::grid::Grid;

/// Reports whether the piece fits after being offset by `(dx, dy)`.
///
/// Every occupied sub-cell must land inside the grid columns and above the
/// floor on an empty cell. Rows above the visible grid are always free.
#[must_use]
pub fn can_place(grid: &Grid, piece: &Piece, dx: i32, dy: i32) -> bool {
    let width = i64::from(grid.width());
    let height = i64::from(grid.height());
    piece.cells().all(|(column, row, _)| {
        let column = i64::from(column) + i64::from(dx);
        let row = i64::from(row) + i64::from(dy);
        if column < 0 || column >= width || row >= height {
            return false;
        }
        if row < 0 {
            return true;
        }
        match (i32::try_from(column), i32::try_from(row)) {
            (Ok(column), Ok(row)) => grid.cell(column, row).is_some_and(|cell| cell.is_empty()),
            _ => false,
        }
    })
}

/// Number of rows the piece can fall before it rests on the floor or a block.
#[must_use]
pub fn drop_distance(grid: &Grid, piece: &Piece) -> i32 {
    let mut distance = 0;
    while distance < i32::MAX && can_place(grid, piece, 0, distance + 1) {
        distance += 1;
    }
    distance
}
