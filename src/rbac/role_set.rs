use std::fmt;

use crate::principal::Role;

/// A set of roles, stored as a bitmask.
///
/// Membership is decided by an exhaustive `match` on [`Role`], so adding a
/// role variant forces every bit assignment to be revisited.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet {
    bits: u8,
}

impl RoleSet {
    /// No roles.
    pub const EMPTY: RoleSet = RoleSet { bits: 0 };

    fn bit(role: Role) -> u8 {
        match role {
            Role::Admin => 1 << 0,
            Role::Qa => 1 << 1,
            Role::Manager => 1 << 2,
            Role::Agent => 1 << 3,
            Role::Viewer => 1 << 4,
        }
    }

    /// Builds a set from a list of roles.
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().copied().collect()
    }

    /// Every role.
    pub fn all() -> Self {
        Self::of(&Role::ALL)
    }

    /// Adds a role.
    pub fn insert(&mut self, role: Role) {
        self.bits |= Self::bit(role);
    }

    /// Membership test.
    pub fn contains(&self, role: Role) -> bool {
        self.bits & Self::bit(role) != 0
    }

    /// True when no role is a member.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Members, most privileged first.
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::EMPTY;
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
