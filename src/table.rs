//! The table grid builder: turns the row/cell tree distilled from a
//! `<table>` subtree into a rectangular grid with non-overlapping merge
//! regions.

use crate::error::Report;
use crate::DocNode;

/// A table as distilled from the DOM: rows of cells with their declared
/// spans, before grid placement.
#[derive(Debug, Default)]
pub struct DocTable {
    pub rows: Vec<DocRow>,
}

/// One `<tr>` worth of cells.
#[derive(Debug, Default)]
pub struct DocRow {
    /// True for rows grouped under `<thead>`.
    pub header: bool,
    pub cells: Vec<DocCell>,
}

/// One `<td>`/`<th>` with its declared spans and block content.
#[derive(Debug)]
pub struct DocCell {
    pub row_span: usize,
    pub col_span: usize,
    /// True for `<th>` cells.
    pub header: bool,
    pub content: Vec<DocNode>,
}

/// A cell placed on the grid.  `row`/`col` are the origin position; the cell
/// occupies `row_span` x `col_span` grid positions from there.
#[derive(Debug)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub header: bool,
    pub content: Vec<DocNode>,
}

/// The resolved rectangular grid.  Positions not covered by any placed
/// cell's span are implicit empty cells, so ragged input rows come out
/// padded rather than rejected.
#[derive(Debug)]
pub struct TableGrid {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<GridCell>,
}

impl TableGrid {
    /// Resolve `table` into a grid.
    ///
    /// A cursor walks each row's cells left to right, skipping positions
    /// reserved by row spans from earlier rows.  Spans that would overlap a
    /// reserved position or run past the grid edge are clamped; a cell with
    /// no free position left in its row is dropped.  All of that is recorded
    /// on `report`, never fatal.
    pub fn build(table: DocTable, report: &mut Report) -> TableGrid {
        let rows = table.rows.len();
        let cols = table
            .rows
            .iter()
            .map(|row| row.cells.iter().map(|c| c.col_span.max(1)).sum())
            .max()
            .unwrap_or(0);

        let mut grid = TableGrid {
            rows,
            cols,
            cells: Vec::new(),
        };
        if rows == 0 || cols == 0 {
            return grid;
        }

        let mut occupied = vec![vec![false; cols]; rows];

        for (r, row) in table.rows.into_iter().enumerate() {
            let mut c = 0;
            for cell in row.cells {
                while c < cols && occupied[r][c] {
                    c += 1;
                }
                if c >= cols {
                    report.warn(format!(
                        "table row {} has more cells than fit in {} columns; extra cell dropped",
                        r, cols
                    ));
                    break;
                }

                let mut col_span = cell.col_span.max(1);
                let mut row_span = cell.row_span.max(1);
                if c + col_span > cols {
                    report.warn(format!(
                        "cell at ({}, {}) colspan {} clamped to table width",
                        r, c, col_span
                    ));
                    col_span = cols - c;
                }
                if r + row_span > rows {
                    report.warn(format!(
                        "cell at ({}, {}) rowspan {} clamped to table height",
                        r, c, row_span
                    ));
                    row_span = rows - r;
                }
                // A span may still collide with a reservation further right.
                let mut free = 1;
                while free < col_span && !occupied[r][c + free] {
                    free += 1;
                }
                if free < col_span {
                    report.warn(format!(
                        "cell at ({}, {}) colspan {} clipped against an earlier row span",
                        r, c, col_span
                    ));
                    col_span = free;
                }

                for occ_row in occupied.iter_mut().take(r + row_span).skip(r) {
                    for occ in occ_row.iter_mut().take(c + col_span).skip(c) {
                        *occ = true;
                    }
                }

                grid.cells.push(GridCell {
                    row: r,
                    col: c,
                    row_span,
                    col_span,
                    header: row.header || cell.header,
                    content: cell.content,
                });
                c += col_span;
            }
        }

        grid
    }

    /// True if the grid has nothing to place.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Check the span invariant: every grid position is covered by at most
    /// one cell's span and no span leaves the grid.  Used by tests.
    pub fn spans_are_disjoint(&self) -> bool {
        let mut seen = vec![false; self.rows * self.cols];
        for cell in &self.cells {
            if cell.row + cell.row_span > self.rows || cell.col + cell.col_span > self.cols {
                return false;
            }
            for r in cell.row..cell.row + cell.row_span {
                for c in cell.col..cell.col + cell.col_span {
                    if seen[r * self.cols + c] {
                        return false;
                    }
                    seen[r * self.cols + c] = true;
                }
            }
        }
        true
    }
}
