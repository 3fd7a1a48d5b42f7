//! Platform model: users, members, channels, guilds and permission bits.
//!
//! These are the shapes the router reads when evaluating guards. Adapters
//! for a concrete chat platform convert their own payloads into them.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

// =============================================================================
// Permissions
// =============================================================================

/// A set of permission bits.
///
/// Bit positions follow the layout most chat platforms share, so adapters can
/// pass their raw integers through [`Permissions::from_bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(u64);

impl Permissions {
    /// No permissions.
    pub const NONE: Self = Self(0);
    pub const CREATE_INVITE: Self = Self(1 << 0);
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    /// Grants every other permission and bypasses admin-only guards.
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const ADD_REACTIONS: Self = Self(1 << 6);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const EMBED_LINKS: Self = Self(1 << 14);
    pub const MANAGE_ROLES: Self = Self(1 << 28);

    /// Wraps raw permission bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw permission bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns `true` if every bit in `other` is also set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over each set bit as its own single-bit value.
    pub fn iter(self) -> impl Iterator<Item = Permissions> {
        (0..u64::BITS)
            .map(|shift| 1u64 << shift)
            .filter(move |bit| self.0 & bit != 0)
            .map(Permissions)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// Users and Members
// =============================================================================

/// A platform user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Whether the account is automated.
    pub bot: bool,
}

impl User {
    /// Creates a human user.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot: false,
        }
    }
}

/// A user's membership in a guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user: User,
    pub guild_id: String,
    pub nickname: Option<String>,
    pub roles: Vec<String>,
    /// Effective guild-level permissions.
    pub permissions: Permissions,
}

impl Member {
    /// Creates a member with no roles and no permissions.
    pub fn new(user: User, guild_id: impl Into<String>) -> Self {
        Self {
            user,
            guild_id: guild_id.into(),
            nickname: None,
            roles: Vec::new(),
            permissions: Permissions::NONE,
        }
    }

    /// Sets the member's permission bits.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Returns the nickname, or the account name when none is set.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.name)
    }
}

// =============================================================================
// Channels and Guilds
// =============================================================================

/// Surface a channel belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A channel inside a guild.
    Guild,
    /// A direct-message conversation.
    Direct,
}

/// A channel a trigger arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub kind: ChannelKind,
    /// Whether the channel is flagged for adult content.
    pub nsfw: bool,
    pub guild_id: Option<String>,
}

impl Channel {
    /// Creates a guild text channel.
    pub fn guild(id: impl Into<String>, guild_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Guild,
            nsfw: false,
            guild_id: Some(guild_id.into()),
        }
    }

    /// Creates a direct-message channel.
    pub fn direct(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Direct,
            nsfw: false,
            guild_id: None,
        }
    }

    /// Flags the channel as nsfw.
    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }
}

/// A guild (server) and its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

impl Guild {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_contains() {
        let granted = Permissions::KICK_MEMBERS | Permissions::BAN_MEMBERS;
        assert!(granted.contains(Permissions::KICK_MEMBERS));
        assert!(!granted.contains(Permissions::MANAGE_ROLES));
        assert!(granted.contains(Permissions::NONE));
    }

    #[test]
    fn test_permissions_iter_single_bits() {
        let granted = Permissions::KICK_MEMBERS | Permissions::MANAGE_ROLES;
        let bits: Vec<_> = granted.iter().collect();
        assert_eq!(bits, vec![Permissions::KICK_MEMBERS, Permissions::MANAGE_ROLES]);
    }

    #[test]
    fn test_permissions_serde_transparent() {
        let parsed: Permissions = serde_json::from_str("8").unwrap();
        assert_eq!(parsed, Permissions::ADMINISTRATOR);
    }

    #[test]
    fn test_member_display_name() {
        let mut member = Member::new(User::new("1", "alice"), "g");
        assert_eq!(member.display_name(), "alice");
        member.nickname = Some("Al".into());
        assert_eq!(member.display_name(), "Al");
    }
}
