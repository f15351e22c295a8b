use crate::spreadsheet::cell::Cell;

/// One row of a sheet: its zero-based index and the cells physically present,
/// ordered by column. Missing cells are absent rather than blank.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    index: usize,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<Cell>) -> Self {
        let mut row = Self { index, cells };
        row.cells.sort_by_key(Cell::col);
        row
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The present cell at a column index, if any.
    pub fn cell_at_column(&self, col: usize) -> Option<&Cell> {
        self.cells
            .binary_search_by_key(&col, Cell::col)
            .ok()
            .map(|position| &self.cells[position])
    }
}

/// A named sheet with its rows in ascending index order.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            rows: Vec::new(),
        }
    }

    /// Builds a sheet from ready-made rows.
    pub fn with_rows(name: &str, rows: Vec<Row>) -> Self {
        let mut sheet = Self { name: name.to_owned(), rows };
        sheet.finish();
        sheet
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first present row.
    pub fn first_row_index(&self) -> Option<usize> {
        self.rows.first().map(Row::index)
    }

    /// The row at the sheet's first row index, used to look up header names.
    pub fn header_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows
            .binary_search_by_key(&index, Row::index)
            .ok()
            .map(|position| &self.rows[position])
    }

    /// Opens a row, so rows without any cell are kept.
    pub(crate) fn push_row(&mut self, index: usize) {
        if self.rows.last().map(Row::index) != Some(index) {
            self.rows.push(Row {
                index,
                cells: Vec::new(),
            });
        }
    }

    /// Appends a parsed cell, opening a new row when the row index changes.
    pub(crate) fn push(&mut self, cell: Cell) {
        match self.rows.last_mut() {
            Some(row) if row.index == cell.row() => row.cells.push(cell),
            _ => self.rows.push(Row {
                index: cell.row(),
                cells: vec![cell],
            }),
        }
    }

    /// Restores row and column order after parsing.
    /// Rows split by out-of-order cells are merged back together.
    pub(crate) fn finish(&mut self) {
        self.rows.sort_by_key(Row::index);
        let mut rows: Vec<Row> = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            match rows.last_mut() {
                Some(last) if last.index == row.index => last.cells.extend(row.cells),
                _ => rows.push(row),
            }
        }
        for row in rows.iter_mut() {
            row.cells.sort_by_key(Cell::col);
        }
        self.rows = rows;
    }
}
