//! ASCII rendering of grids and snapshots.

use std::fmt::Write as _;

use cascade_core::{Cell, CellKind, GameSnapshot, Piece};

const COLOR_GLYPHS: [char; 7] = ['R', 'G', 'B', 'Y', 'P', 'C', 'O'];
const PIECE_GLYPH: char = '@';
const UNIT_GLYPH: char = '*';
const OTHER_VALUE_GLYPH: char = '#';

/// Character drawn for a locked cell.
///
/// Numeric powers of two show their base-36 exponent, so `2` draws as `1` and
/// `2048` draws as `b`. A value of one draws as `*` and other values as `#`.
pub(crate) fn glyph(cell: Cell) -> char {
    match cell.kind() {
        None => '.',
        Some(CellKind::Color(tag)) => COLOR_GLYPHS[usize::from(tag.get()) % COLOR_GLYPHS.len()],
        Some(CellKind::Numeric(1)) => UNIT_GLYPH,
        Some(CellKind::Numeric(value)) if value.is_power_of_two() => {
            char::from_digit(value.trailing_zeros(), 36).unwrap_or(OTHER_VALUE_GLYPH)
        }
        Some(CellKind::Numeric(_)) => OTHER_VALUE_GLYPH,
        Some(CellKind::Marker) => 'm',
    }
}

/// Draws the rows with the falling piece overlaid.
pub(crate) fn board<'a>(rows: impl Iterator<Item = &'a [Cell]>, piece: Option<&Piece>) -> String {
    let mut canvas: Vec<Vec<char>> = rows
        .map(|row| row.iter().copied().map(glyph).collect())
        .collect();
    if let Some(piece) = piece {
        for (column, row, _) in piece.cells() {
            let (Ok(column), Ok(row)) = (usize::try_from(column), usize::try_from(row)) else {
                continue;
            };
            if let Some(slot) = canvas.get_mut(row).and_then(|line| line.get_mut(column)) {
                *slot = PIECE_GLYPH;
            }
        }
    }

    let width = canvas.first().map_or(0, Vec::len);
    let mut out = String::new();
    for line in &canvas {
        out.push('|');
        out.extend(line.iter());
        out.push_str("|\n");
    }
    out.push('+');
    out.push_str(&"-".repeat(width));
    out.push('+');
    out
}

/// Multi-line report of a snapshot: board, preview and counters.
pub(crate) fn snapshot(snapshot: &GameSnapshot) -> String {
    let mut out = board(snapshot.grid.rows(), snapshot.current_piece.as_ref());
    if let Some(next) = &snapshot.next_piece {
        let preview = next.shape();
        let _ = write!(out, "\nnext ({}x{}):", preview.width(), preview.height());
        let mut rows = vec![vec!['.'; preview.width() as usize]; preview.height() as usize];
        for (column, row, kind) in preview.occupied() {
            rows[row as usize][column as usize] = glyph(Cell::Occupied(kind));
        }
        for row in rows {
            out.push_str("\n  ");
            out.extend(row);
        }
    }
    let _ = write!(
        out,
        "\nstate={:?} score={} level={} lines={} chain={} max_chain={} max_value={}",
        snapshot.state,
        snapshot.score,
        snapshot.level,
        snapshot.lines_cleared,
        snapshot.last_chain,
        snapshot.max_chain,
        snapshot.max_value,
    );
    out
}
