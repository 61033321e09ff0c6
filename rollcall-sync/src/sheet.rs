//! Destination spreadsheet seam and sheet layout.
//!
//! ## Layout
//!
//! ```text
//!        A          B            C      D      …
//!   1    (label)    <timestamp>
//!   2    (label)    (label)      role₁  role₂  …
//!   3    (label)    (label)
//!   4    username   nickname     0/1    0/1    …
//!   …
//! ```
//!
//! Rows 1–3 and columns A–B are reserved for hand-maintained labels and are
//! never deleted.

use rollcall_core::Cell;
use serde::{Deserialize, Serialize};

/// How the destination service should treat written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueInput {
    /// Stored verbatim.
    #[serde(rename = "RAW")]
    Raw,
    /// Parsed as if typed by a user (dates, numbers, formulas).
    #[serde(rename = "USER_ENTERED")]
    UserEntered,
}

impl ValueInput {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInput::Raw => "RAW",
            ValueInput::UserEntered => "USER_ENTERED",
        }
    }
}

/// One structural edit: drop every row and column from the given zero-based
/// indices to the end of the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuralEdit {
    pub sheet_id: i64,
    pub delete_rows_from: u32,
    pub delete_columns_from: u32,
}

/// A destination spreadsheet. Every call is an independent, fallible
/// operation against the remote document.
pub trait SpreadsheetHandle {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply a batch of dimension deletions.
    fn batch_structural_edit(&mut self, edit: &StructuralEdit) -> Result<(), Self::Error>;

    /// Append `rows` to the table found at `range`, overwriting empty cells
    /// rather than inserting new rows.
    fn append_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error>;

    /// Overwrite `range` with `rows`.
    fn update_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error>;
}

impl<T: SpreadsheetHandle + ?Sized> SpreadsheetHandle for &mut T {
    type Error = T::Error;

    fn batch_structural_edit(&mut self, edit: &StructuralEdit) -> Result<(), Self::Error> {
        (**self).batch_structural_edit(edit)
    }

    fn append_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error> {
        (**self).append_values(range, rows, input)
    }

    fn update_values(
        &mut self,
        range: &str,
        rows: &[Vec<Cell>],
        input: ValueInput,
    ) -> Result<(), Self::Error> {
        (**self).update_values(range, rows, input)
    }
}

/// Where the roster lives inside the destination document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetLayout {
    pub sheet_id: i64,
    pub sheet_name: Option<String>,
}

impl SheetLayout {
    /// Zero-based index of the first member row (row 4).
    pub const FIRST_MEMBER_ROW: u32 = 3;
    /// Zero-based index of the first role column (column C).
    pub const FIRST_ROLE_COLUMN: u32 = 2;

    pub const HEADER_RANGE: &'static str = "C2:2";
    pub const MEMBERS_RANGE: &'static str = "A4";
    pub const STAMP_RANGE: &'static str = "B1";

    pub fn new(sheet_id: i64, sheet_name: Option<String>) -> Self {
        Self {
            sheet_id,
            sheet_name,
        }
    }

    pub fn from_config(config: &rollcall_core::Config) -> Self {
        Self::new(config.sheet_id, config.sheet_name.clone())
    }

    pub fn clear_edit(&self) -> StructuralEdit {
        StructuralEdit {
            sheet_id: self.sheet_id,
            delete_rows_from: Self::FIRST_MEMBER_ROW,
            delete_columns_from: Self::FIRST_ROLE_COLUMN,
        }
    }

    pub fn header_range(&self) -> String {
        self.qualify(Self::HEADER_RANGE)
    }

    pub fn members_range(&self) -> String {
        self.qualify(Self::MEMBERS_RANGE)
    }

    pub fn stamp_range(&self) -> String {
        self.qualify(Self::STAMP_RANGE)
    }

    /// Prefix an A1 range with the quoted tab name, if one is configured.
    fn qualify(&self, a1: &str) -> String {
        match &self.sheet_name {
            Some(name) => format!("'{}'!{a1}", name.replace('\'', "''")),
            None => a1.to_string(),
        }
    }
}
