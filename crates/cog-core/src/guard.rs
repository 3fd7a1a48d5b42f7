//! Guard collaborators: permission checks and member lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{Channel, Member, Permissions};

/// Answers whether a member holds a permission in a channel.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has_permission(
        &self,
        member: &Member,
        channel: &Channel,
        permission: Permissions,
    ) -> bool;
}

/// [`PermissionChecker`] that reads the member's own guild-level bits.
///
/// Administrators hold every permission. Channel overwrites are not modelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticPermissionChecker;

#[async_trait]
impl PermissionChecker for StaticPermissionChecker {
    async fn has_permission(
        &self,
        member: &Member,
        _channel: &Channel,
        permission: Permissions,
    ) -> bool {
        member.permissions.contains(Permissions::ADMINISTRATOR)
            || member.permissions.contains(permission)
    }
}

/// Looks up guild members, typically from the gateway's member cache.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member(&self, guild_id: &str, user_id: &str) -> Option<Member>;
}

/// In-process [`MemberDirectory`].
#[derive(Default)]
pub struct MemoryMemberDirectory {
    members: RwLock<HashMap<(String, String), Member>>,
}

impl MemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a member.
    pub fn insert(&self, member: Member) {
        let key = (member.guild_id.clone(), member.user.id.clone());
        self.members.write().insert(key, member);
    }
}

#[async_trait]
impl MemberDirectory for MemoryMemberDirectory {
    async fn member(&self, guild_id: &str, user_id: &str) -> Option<Member> {
        self.members
            .read()
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned()
    }
}
