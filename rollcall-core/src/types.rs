//! Domain types for the roster mirror.
//!
//! A [`DirectorySnapshot`] is what a chat community looks like at one point in
//! time; a [`RosterTable`] is the flat tabular form written to the sheet.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a community role. Compared exactly (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoleName(pub String);

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RoleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Platform username of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Username(pub String);

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Username {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One community member and the roles they hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub username: Username,
    pub nickname: Option<String>,
    pub roles: HashSet<RoleName>,
}

impl Member {
    pub fn new(
        username: impl Into<Username>,
        nickname: Option<&str>,
        roles: &[&str],
    ) -> Self {
        Self {
            username: username.into(),
            nickname: nickname.map(str::to_owned),
            roles: roles.iter().map(|&r| RoleName::from(r)).collect(),
        }
    }

    pub fn holds(&self, role: &RoleName) -> bool {
        self.roles.contains(role)
    }
}

/// Point-in-time read of a community's roles and members.
///
/// Member order is whatever the provider returned and carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub roles: Vec<RoleName>,
    pub members: Vec<Member>,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A single spreadsheet cell value.
///
/// Serializes to the JSON shape the Sheets values API expects: strings for
/// text, numbers for indicators, and `""` for an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    Text(String),
    Number(i64),
    #[default]
    Empty,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Empty => Ok(()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number(n) => serializer.serialize_i64(*n),
            Cell::Empty => serializer.serialize_str(""),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_owned())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Number(n)
    }
}

/// `[username, nickname, indicator...]`
pub type MemberRow = Vec<Cell>;

/// Header plus indicator matrix, computed fresh for every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTable {
    /// Role names in column order, sorted ascending.
    pub header: Vec<RoleName>,
    pub rows: Vec<MemberRow>,
}

impl RosterTable {
    /// The header as a single row of text cells.
    pub fn header_row(&self) -> Vec<Cell> {
        self.header
            .iter()
            .map(|role| Cell::Text(role.0.clone()))
            .collect()
    }

    pub fn role_count(&self) -> usize {
        self.header.len()
    }

    pub fn member_count(&self) -> usize {
        self.rows.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(RoleName::from("Admin").to_string(), "Admin");
        assert_eq!(Username::from("alice").to_string(), "alice");
    }

    #[test]
    fn cell_serializes_to_sheet_values() {
        let row = vec![Cell::from("Alice"), Cell::Empty, Cell::Number(1)];
        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, r#"["Alice","",1]"#);
    }

    #[test]
    fn member_role_match_is_case_sensitive() {
        let member = Member::new("alice", None, &["Admin"]);
        assert!(member.holds(&RoleName::from("Admin")));
        assert!(!member.holds(&RoleName::from("admin")));
    }

    #[test]
    fn header_row_is_text_cells() {
        let table = RosterTable {
            header: vec![RoleName::from("A"), RoleName::from("B")],
            rows: vec![],
        };
        assert_eq!(table.header_row(), vec![Cell::from("A"), Cell::from("B")]);
        assert_eq!(table.role_count(), 2);
        assert_eq!(table.member_count(), 0);
    }
}
