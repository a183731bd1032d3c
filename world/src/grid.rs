//! Fixed-capacity cell storage for the playfield.

use cascade_core::{Cell, CellCoord, GridError, GridSnapshot};

/// Row-major playfield whose row zero is the spawn row at the top.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Creates an empty grid with the provided dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let capacity_u64 = u64::from(width) * u64::from(height);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            width,
            height,
            cells: vec![Cell::Empty; capacity],
        }
    }

    /// Builds a grid from row-major cells, returning `None` on a size mismatch.
    #[must_use]
    pub fn from_cells(width: u32, height: u32, cells: Vec<Cell>) -> Option<Self> {
        let expected = usize::try_from(u64::from(width) * u64::from(height)).ok()?;
        (cells.len() == expected).then_some(Self {
            width,
            height,
            cells,
        })
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cell stored at the coordinate.
    pub fn get(&self, coord: CellCoord) -> Result<Cell, GridError> {
        let index = self.index(coord)?;
        Ok(self.cells[index])
    }

    /// Overwrites the cell stored at the coordinate.
    pub fn set(&mut self, coord: CellCoord, cell: Cell) -> Result<(), GridError> {
        let index = self.index(coord)?;
        self.cells[index] = cell;
        Ok(())
    }

    /// Cell at signed coordinates, or `None` when they fall outside the grid.
    #[must_use]
    pub fn cell(&self, column: i32, row: i32) -> Option<Cell> {
        let column = u32::try_from(column).ok()?;
        let row = u32::try_from(row).ok()?;
        self.get(CellCoord::new(column, row)).ok()
    }

    /// Reports whether every cell of the row is occupied.
    pub fn is_row_full(&self, row: u32) -> Result<bool, GridError> {
        Ok(self.row(row)?.iter().all(Cell::is_occupied))
    }

    /// Removes the row and shifts every row above it down by one.
    ///
    /// The rows `0..=row` are rotated in place so the removed row ends up at
    /// the top, where it is blanked.
    pub fn clear_row(&mut self, row: u32) -> Result<(), GridError> {
        let start = self.index(CellCoord::new(0, row))?;
        let width = self.row_len();
        let prefix = &mut self.cells[..start + width];
        prefix.rotate_right(width);
        prefix[..width].fill(Cell::Empty);
        Ok(())
    }

    /// Slides occupied cells down each column, keeping their vertical order.
    ///
    /// Returns `true` when at least one cell moved.
    pub fn compact_columns_gravity(&mut self) -> bool {
        let width = self.row_len();
        let height = usize::try_from(self.height).unwrap_or(0);
        let mut moved = false;
        for column in 0..width {
            let mut write = height;
            for read in (0..height).rev() {
                let source = read * width + column;
                if self.cells[source].is_empty() {
                    continue;
                }
                write -= 1;
                if write != read {
                    let target = write * width + column;
                    self.cells[target] = self.cells[source];
                    self.cells[source] = Cell::Empty;
                    moved = true;
                }
            }
        }
        moved
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    /// Row-major view of all cells.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Cells of one row from left to right.
    pub fn row(&self, row: u32) -> Result<&[Cell], GridError> {
        let start = self.index(CellCoord::new(0, row))?;
        Ok(&self.cells[start..start + self.row_len()])
    }

    /// Iterator over rows from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.row_len().max(1))
    }

    /// Largest numeric value present, or zero when there is none.
    #[must_use]
    pub fn max_numeric(&self) -> u32 {
        self.cells
            .iter()
            .filter_map(Cell::numeric_value)
            .max()
            .unwrap_or(0)
    }

    /// Sum of all numeric values.
    #[must_use]
    pub fn numeric_sum(&self) -> u64 {
        self.cells
            .iter()
            .filter_map(Cell::numeric_value)
            .map(u64::from)
            .sum()
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_occupied()).count()
    }

    /// Owned copy of the cells for presentation.
    #[must_use]
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot::new(self.width, self.height, self.cells.clone())
    }

    fn row_len(&self) -> usize {
        usize::try_from(self.width).unwrap_or(0)
    }

    fn index(&self, coord: CellCoord) -> Result<usize, GridError> {
        let out_of_bounds = GridError::OutOfBounds {
            column: coord.column(),
            row: coord.row(),
            width: self.width,
            height: self.height,
        };
        if coord.column() >= self.width || coord.row() >= self.height {
            return Err(out_of_bounds);
        }
        let row = usize::try_from(coord.row()).map_err(|_| out_of_bounds)?;
        let column = usize::try_from(coord.column()).map_err(|_| out_of_bounds)?;
        Ok(row * self.row_len() + column)
    }
}
