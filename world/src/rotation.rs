//! Clockwise rotation with horizontal wall kicks.

use cascade_core::Piece;

use crate::{grid::Grid, motion::can_place};

/// Horizontal offsets tried, in order, when the unkicked rotation is blocked.
pub const KICK_OFFSETS: [i32; 4] = [-1, 1, -2, 2];

/// Result of a rotation attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rotation {
    /// The rotated piece fits after applying the horizontal kick.
    Rotated {
        /// Rotated and kicked piece.
        piece: Piece,
        /// Horizontal offset that was applied.
        kick: i32,
    },
    /// No candidate fits; the original piece is returned unchanged.
    Blocked {
        /// Piece as it was before the attempt.
        piece: Piece,
    },
}

/// Turns the piece clockwise, trying wall kicks at the unchanged row.
#[must_use]
pub fn rotate(grid: &Grid, piece: &Piece) -> Rotation {
    let rotated = piece.rotated_clockwise();
    std::iter::once(0)
        .chain(KICK_OFFSETS)
        .find(|kick| can_place(grid, &rotated, *kick, 0))
        .map_or_else(
            || Rotation::Blocked {
                piece: piece.clone(),
            },
            |kick| Rotation::Rotated {
                piece: rotated.shifted(kick, 0),
                kick,
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_core::{Cell, CellCoord, CellKind, Shape};

    fn horizontal_bar() -> Shape {
        Shape::from_cells(4, 1, vec![Some(CellKind::Color(cascade_core::ColorTag::new(0))); 4])
            .expect("valid shape")
    }

    #[test]
    fn free_rotation_uses_no_kick() {
        let grid = Grid::new(10, 20);
        let piece = Piece::new(horizontal_bar(), 3, 5);
        match rotate(&grid, &piece) {
            Rotation::Rotated { piece: rotated, kick } => {
                assert_eq!(kick, 0);
                assert_eq!((rotated.column(), rotated.row()), (3, 5));
                assert_eq!(rotated.rotation(), 1);
                assert_eq!(rotated.shape().height(), 4);
            }
            Rotation::Blocked { .. } => panic!("rotation should succeed"),
        }
    }

    #[test]
    fn kicks_follow_offset_order() {
        let mut grid = Grid::new(6, 8);
        let vertical = Piece::new(horizontal_bar(), 0, 0).rotated_clockwise();
        let piece = Piece::new(vertical.shape().clone(), 2, 2);
        grid.set(CellCoord::new(5, 2), Cell::marker()).expect("in bounds");
        match rotate(&grid, &piece) {
            Rotation::Rotated { piece: rotated, kick } => {
                assert_eq!(kick, -1);
                assert_eq!(rotated.column(), 1);
            }
            Rotation::Blocked { .. } => panic!("left kick should fit"),
        }

        let mut grid = Grid::new(10, 8);
        grid.set(CellCoord::new(2, 2), Cell::marker()).expect("in bounds");
        match rotate(&grid, &piece) {
            Rotation::Rotated { piece: rotated, kick } => {
                assert_eq!(kick, 1);
                assert_eq!(rotated.column(), 3);
            }
            Rotation::Blocked { .. } => panic!("right kick should fit"),
        }
    }

    #[test]
    fn boxed_in_rotation_is_blocked() {
        let mut grid = Grid::new(4, 8);
        for column in 1..4 {
            grid.set(CellCoord::new(column, 2), Cell::marker()).expect("in bounds");
        }
        let vertical = Piece::new(horizontal_bar(), 0, 0).rotated_clockwise();
        let piece = Piece::new(vertical.shape().clone(), 0, 2);
        assert_eq!(
            rotate(&grid, &piece),
            Rotation::Blocked {
                piece: piece.clone()
            }
        );
    }
}
