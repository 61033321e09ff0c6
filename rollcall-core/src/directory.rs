//! Seam for group directory providers.

use crate::types::{DirectorySnapshot, Member, RoleName};

/// Source of a community's roles and members.
///
/// Implementations perform blocking I/O; callers in async contexts run them
/// on a blocking thread.
pub trait DirectorySource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn fetch_roles(&self) -> Result<Vec<RoleName>, Self::Error>;

    fn fetch_members(&self) -> Result<Vec<Member>, Self::Error>;

    /// Roles first, then members.
    fn snapshot(&self) -> Result<DirectorySnapshot, Self::Error> {
        let roles = self.fetch_roles()?;
        let members = self.fetch_members()?;
        Ok(DirectorySnapshot { roles, members })
    }
}

impl<T: DirectorySource + ?Sized> DirectorySource for &T {
    type Error = T::Error;

    fn fetch_roles(&self) -> Result<Vec<RoleName>, Self::Error> {
        (**self).fetch_roles()
    }

    fn fetch_members(&self) -> Result<Vec<Member>, Self::Error> {
        (**self).fetch_members()
    }

    fn snapshot(&self) -> Result<DirectorySnapshot, Self::Error> {
        (**self).snapshot()
    }
}
