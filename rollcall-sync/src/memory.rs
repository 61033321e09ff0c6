//! In-memory spreadsheet used by `sync --dry-run` and the test suites.
//!
//! Models a single tab as a ragged grid of [`Cell`]s. Structural edits
//! truncate the grid; appends write below the last occupied row of the target
//! area; updates overwrite in place. Failures can be injected per range.

use rollcall_core::Cell;
use thiserror::Error;

use crate::sheet::{SpreadsheetHandle, StructuralEdit, ValueInput};

static EMPTY: Cell = Cell::Empty;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemorySheetError {
    #[error("invalid A1 range '{0}'")]
    BadRange(String),

    #[error("injected failure for {0}")]
    Injected(String),
}

/// A recorded call against the sheet, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetOp {
    Edit(StructuralEdit),
    Append {
        range: String,
        rows: usize,
        input: ValueInput,
    },
    Update {
        range: String,
        rows: usize,
        input: ValueInput,
    },
}

#[derive(Debug, Clone, Default)]
pub struct MemorySheet {
    grid: Vec<Vec<Cell>>,
    ops: Vec<SheetOp>,
    fail_edits: bool,
    fail_ranges: Vec<String>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing content, e.g. the labels a human put in A1:B3.
    pub fn with_grid(grid: Vec<Vec<Cell>>) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    /// Make every structural edit fail.
    pub fn fail_structural_edits(mut self) -> Self {
        self.fail_edits = true;
        self
    }

    /// Make every write to `range` fail.
    pub fn fail_writes_to(mut self, range: impl Into<String>) -> Self {
        self.fail_ranges.push(range.into());
        self
    }

    /// 1-based cell lookup; out-of-bounds cells are empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        row.checked_sub(1)
            .zip(col.checked_sub(1))
            .and_then(|(r, c)| self.grid.get(r).and_then(|cells| cells.get(c)))
            .unwrap_or(&EMPTY)
    }

    /// Grid with trailing empty cells and trailing empty rows removed.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        let mut rows: Vec<Vec<Cell>> = self
            .grid
            .iter()
            .map(|row| {
                let end = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
                row[..end].to_vec()
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        rows
    }

    pub fn ops(&self) -> &[SheetOp] {
        &self.ops
    }

    fn check_injected(&self, range: &str) -> Result<(), MemorySheetError> {
        if self.fail_ranges.iter().any(|r| r == range) {
            return Err(MemorySheetError::Injected(range.to_string()));
        }
        Ok(())
    }

    fn row_occupied_from(&self, row: usize, col: usize) -> bool {
        self.grid
            .get(row)
            .map(|cells| cells.iter().skip(col).any(|c| !c.is_empty()))
            .unwrap_or(false)
    }

    fn write_at(&mut self, row: usize, col: usize, rows: &[Vec<Cell>]) {
        for (offset, values) in rows.iter().enumerate() {
            if values.is_empty() {
                continue;
            }
            let r = row + offset;
            if self.grid.len() <= r {
                self.grid.resize_with(r + 1, Vec::new);
            }
            let target = &mut self.grid[r];
            if target.len() < col + values.len() {
                target.resize(col + values.len(), Cell::Empty);
            }
            target[col..col + values.len()].clone_from_slice(values);
        }
    }
}

impl SpreadsheetHandle for MemorySheet {
    type Error = MemorySheetError;

    fn batch_structural_edit(&mut self, edit: &StructuralEdit) -> Result<(), Self::Error> {
        self.ops.push(SheetOp::Edit(*edit));
        if self.fail_edits {
            return Err(MemorySheetError::Injected("structural edit".to_string()));
        }
        self.grid.truncate(edit.delete_rows_from as usize);
        for row in &mut self.grid {
            row.truncate(edit.delete_columns_from as usize);
        }
        Ok(())
    }

    fn append_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error> {
        self.ops.push(SheetOp::Append {
            range: range.to_string(),
            rows: rows.len(),
            input,
        });
        self.check_injected(range)?;
        let (start_row, col) = parse_a1_start(range)?;
        let mut row = start_row;
        while self.row_occupied_from(row, col) {
            row += 1;
        }
        self.write_at(row, col, rows);
        Ok(())
    }

    fn update_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error> {
        self.ops.push(SheetOp::Update {
            range: range.to_string(),
            rows: rows.len(),
            input,
        });
        self.check_injected(range)?;
        let (row, col) = parse_a1_start(range)?;
        self.write_at(row, col, rows);
        Ok(())
    }
}

/// Zero-based `(row, column)` of the top-left corner of an A1 range.
///
/// Accepts `B1`, `C2:2`, `A4`, and tab-qualified forms such as `'Roster'!A4`.
/// A missing row (`C:C`) starts at row 0; a missing column (`2:2`) at column 0.
fn parse_a1_start(range: &str) -> Result<(usize, usize), MemorySheetError> {
    let bad = || MemorySheetError::BadRange(range.to_string());
    let local = range.rsplit_once('!').map_or(range, |(_, r)| r);
    let first = local.split(':').next().unwrap_or_default();
    if first.is_empty() {
        return Err(bad());
    }

    let split = first
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(first.len());
    let (letters, digits) = first.split_at(split);
    if !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(bad());
    }

    let col = letters
        .chars()
        .fold(0usize, |acc, c| {
            acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        })
        .saturating_sub(1);
    let row = if digits.is_empty() {
        0
    } else {
        digits
            .parse::<usize>()
            .ok()
            .and_then(|r| r.checked_sub(1))
            .ok_or_else(bad)?
    };
    Ok((row, col))
}
