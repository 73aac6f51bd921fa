//! Factions and memberships.
//!
//! Owned by the faction-management subsystem; boards only read them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lock::Locks;

/// Rank at or below which a member is a faction leader
pub const LEADER_RANK: i32 = 1;

/// Faction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub description: Option<String>,
    pub category: String,
    pub private: bool,
    pub hidden: bool,
    pub can_leave: bool,
    pub kick_rank: i32,
    pub start_rank: i32,
    pub title_self: bool,
    /// Granted to every member
    pub member_permissions: BTreeSet<String>,
    /// Granted to anyone holding a membership row, regardless of rank
    pub public_permissions: BTreeSet<String>,
    pub locks: Locks,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Membership row for (faction, character)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub faction_id: i64,
    pub character_id: Uuid,
    pub rank: i32,
    pub rank_permissions: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Membership {
    pub fn is_leader(&self) -> bool {
        self.rank <= LEADER_RANK
    }
}
