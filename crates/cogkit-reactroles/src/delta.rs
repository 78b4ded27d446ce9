//! Accumulated role additions/removals pending application for one subject.

use std::collections::HashSet;

use cogkit_core::{GuildId, RoleId, UserId};

/// The net role-set change queued for one (guild, user) subject.
///
/// Invariants:
/// - a role id never sits in both `to_add` and `to_remove`; inserting into
///   one set evicts it from the other;
/// - `to_remove` always contains the guild's everyone role, so a full
///   role-list replacement can never re-add it.
#[derive(Debug, Clone)]
pub struct PendingDelta {
    pub guild_id: GuildId,
    pub user_id: UserId,
    to_add: HashSet<RoleId>,
    to_remove: HashSet<RoleId>,
}

impl PendingDelta {
    /// `everyone` is the guild's implicit default role; it seeds
    /// `to_remove` at construction so the invariant holds from the start.
    pub fn new(guild_id: GuildId, user_id: UserId, everyone: RoleId) -> Self {
        let mut to_remove = HashSet::new();
        to_remove.insert(everyone);
        Self {
            guild_id,
            user_id,
            to_add: HashSet::new(),
            to_remove,
        }
    }

    /// Merge one event into the delta. Last writer per role wins.
    ///
    /// `linked` is the set of roles mutually exclusive with `role`; they
    /// are dropped from `to_add` and queued for removal before `role`
    /// itself is placed.
    pub fn apply(&mut self, role: RoleId, grant: bool, linked: &HashSet<RoleId>) {
        for conflicting in linked {
            self.to_add.remove(conflicting);
            self.to_remove.insert(*conflicting);
        }
        if grant {
            self.to_remove.remove(&role);
            self.to_add.insert(role);
        } else {
            self.to_add.remove(&role);
            self.to_remove.insert(role);
        }
    }

    /// `(current ∪ to_add) \ to_remove`, sorted for deterministic calls.
    pub fn target_roles(&self, current: &[RoleId]) -> Vec<RoleId> {
        let mut set: HashSet<RoleId> = current.iter().copied().collect();
        set.extend(self.to_add.iter().copied());
        for role in &self.to_remove {
            set.remove(role);
        }
        let mut out: Vec<RoleId> = set.into_iter().collect();
        out.sort();
        out
    }

    pub fn to_add(&self) -> &HashSet<RoleId> {
        &self.to_add
    }

    pub fn to_remove(&self) -> &HashSet<RoleId> {
        &self.to_remove
    }
}
