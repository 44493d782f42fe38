// SPDX-FileCopyrightText: 2026 Rolekeeper Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform snowflake identifiers.
//!
//! Each platform object kind gets its own newtype so a role id can never be
//! passed where a channel id is expected. Local entity ids (rules, scopes,
//! operations, collections) are plain `i64` row ids.

use serde::{Deserialize, Serialize};

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw snowflake value.
            pub fn get(self) -> u64 {
                self.0
            }

            /// Converts to the signed representation used by SQLite columns.
            pub fn to_db(self) -> i64 {
                self.0 as i64
            }

            /// Converts from the signed representation used by SQLite columns.
            pub fn from_db(raw: i64) -> Self {
                Self(raw as u64)
            }
        }

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

snowflake_id!(
    /// A guild (community space).
    GuildId
);
snowflake_id!(
    /// A channel within a guild.
    ChannelId
);
snowflake_id!(
    /// A message within a channel.
    MessageId
);
snowflake_id!(
    /// A role within a guild.
    RoleId
);
snowflake_id!(
    /// A user account.
    UserId
);

/// Row id of a permission scope.
pub type ScopeId = i64;
/// Row id of a reaction rule.
pub type RuleId = i64;
/// Row id of a mass role operation.
pub type OperationId = i64;
/// Row id of an auto-role rule.
pub type AutoRoleId = i64;
/// Row id of a message collection.
pub type CollectionId = i64;
/// Row id of a message collection item.
pub type ItemId = i64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_snowflakes_survive_db_conversion() {
        let id = RoleId(u64::MAX - 3);
        assert_eq!(RoleId::from_db(id.to_db()), id);
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&ChannelId(42)).unwrap();
        assert_eq!(json, "42");
    }
}
