//! Roster table builder.
//!
//! Turns a [`DirectorySnapshot`] into a [`RosterTable`]:
//!
//! 1. Collect every role name and sort ascending. Ordering is Rust's `str`
//!    ordering, i.e. byte-wise UTF-8, which equals Unicode code-point order.
//!    No locale collation is applied.
//! 2. One row per member, in snapshot order:
//!    `[username, nickname, indicator for each header role]`.
//!    A missing nickname becomes [`Cell::Empty`]. Indicators are `1`/`0`.

use crate::types::{Cell, DirectorySnapshot, Member, MemberRow, RoleName, RosterTable};

/// Build the roster table for one pass. Pure; never fails.
pub fn build_roster_table(snapshot: &DirectorySnapshot) -> RosterTable {
    let header = sorted_header(&snapshot.roles);
    let rows = snapshot
        .members
        .iter()
        .map(|member| member_row(member, &header))
        .collect();
    RosterTable { header, rows }
}

fn sorted_header(roles: &[RoleName]) -> Vec<RoleName> {
    let mut header = roles.to_vec();
    header.sort();
    header
}

fn member_row(member: &Member, header: &[RoleName]) -> MemberRow {
    let mut row = Vec::with_capacity(header.len() + 2);
    row.push(Cell::Text(member.username.0.clone()));
    row.push(match &member.nickname {
        Some(nick) => Cell::Text(nick.clone()),
        None => Cell::Empty,
    });
    row.extend(
        header
            .iter()
            .map(|role| Cell::Number(i64::from(member.holds(role)))),
    );
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sorted_by_code_point() {
        let snapshot = DirectorySnapshot {
            roles: vec!["beta".into(), "Alpha".into(), "alpha".into(), "@everyone".into()],
            members: vec![],
        };
        let table = build_roster_table(&snapshot);
        let names: Vec<&str> = table.header.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(names, ["@everyone", "Alpha", "alpha", "beta"]);
    }

    #[test]
    fn row_width_is_two_plus_roles() {
        let snapshot = DirectorySnapshot {
            roles: vec!["a".into(), "b".into(), "c".into()],
            members: vec![Member::new("m", Some("n"), &[])],
        };
        let table = build_roster_table(&snapshot);
        assert_eq!(table.rows[0].len(), 5);
    }
}
