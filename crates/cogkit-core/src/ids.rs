//! Platform identifier newtypes.
//!
//! All platform objects are addressed by 64-bit snowflake-style ids. The
//! newtypes keep guild/channel/user/role ids from being swapped at call
//! sites; they serialise as bare integers.

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// A guild (server).
    GuildId
);
id_type!(
    /// A text channel inside a guild.
    ChannelId
);
id_type!(
    /// A single message inside a channel.
    MessageId
);
id_type!(
    /// A platform user account.
    UserId
);
id_type!(
    /// A guild role.
    RoleId
);

/// A (guild, user) pair whose role membership may change.
///
/// This is the unit of coalescing for role mutations: all pending role
/// edits for the same subject are merged into a single platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    pub guild_id: GuildId,
    pub user_id: UserId,
}

impl Subject {
    pub fn new(guild_id: GuildId, user_id: UserId) -> Self {
        Self { guild_id, user_id }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.guild_id, self.user_id)
    }
}
