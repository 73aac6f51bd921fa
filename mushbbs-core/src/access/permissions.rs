//! Faction permission resolution
//!
//! Membership is looked up on every call and never cached: rank and
//! permission changes take effect on the next request.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::Result;
use crate::models::{Faction, Membership, LEADER_RANK};
use crate::repo::FactionDirectory;

/// Effective standing of a character inside one faction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionContext {
    pub rank: i32,
    /// Lower-cased union of member, public, rank and individual permissions
    pub permissions: BTreeSet<String>,
}

impl PermissionContext {
    /// Combine a faction's permission sets with one membership row
    pub fn from_membership(faction: &Faction, membership: &Membership) -> Self {
        let permissions = faction
            .member_permissions
            .iter()
            .chain(&faction.public_permissions)
            .chain(&membership.rank_permissions)
            .chain(&membership.permissions)
            .map(|p| p.to_lowercase())
            .collect();

        Self {
            rank: membership.rank,
            permissions,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.rank <= LEADER_RANK
    }

    /// Leaders pass every check; everyone else needs the permission by name
    pub fn allows(&self, permission: &str) -> bool {
        self.is_leader() || self.permissions.contains(&permission.to_lowercase())
    }
}

/// Resolves faction membership into permissions
#[derive(Clone, Copy)]
pub struct PermissionResolver<'a> {
    directory: &'a dyn FactionDirectory,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(directory: &'a dyn FactionDirectory) -> Self {
        Self { directory }
    }

    /// `None` when the character holds no membership in `faction`
    pub async fn resolve(
        &self,
        faction: &Faction,
        character_id: Uuid,
    ) -> Result<Option<PermissionContext>> {
        let membership = self.directory.get_membership(faction, character_id).await?;
        Ok(membership.map(|m| PermissionContext::from_membership(faction, &m)))
    }

    /// Case-insensitive permission check; false for non-members
    pub async fn has_permission(
        &self,
        faction: &Faction,
        character_id: Uuid,
        permission: &str,
    ) -> Result<bool> {
        Ok(self
            .resolve(faction, character_id)
            .await?
            .is_some_and(|ctx| ctx.allows(permission)))
    }
}
