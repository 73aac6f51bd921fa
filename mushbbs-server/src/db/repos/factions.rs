//! Faction directory reads
//!
//! Factions are managed elsewhere; boards only need lookups and the
//! membership row joined with its rank's permissions.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use mushbbs_core::models::{Faction, Membership};
use mushbbs_core::Locks;

use super::DbError;

const FACTION_COLUMNS: &str = r#"
    id, name, abbreviation, description, category, private, hidden, can_leave,
    kick_rank, start_rank, title_self, member_permissions, public_permissions,
    locks, created_at, updated_at, deleted_at
"#;

#[derive(Debug, Clone, FromRow)]
pub struct FactionRow {
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
    pub member_permissions: Vec<String>,
    pub public_permissions: Vec<String>,
    pub locks: Json<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<FactionRow> for Faction {
    fn from(row: FactionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            abbreviation: row.abbreviation,
            description: row.description,
            category: row.category,
            private: row.private,
            hidden: row.hidden,
            can_leave: row.can_leave,
            kick_rank: row.kick_rank,
            start_rank: row.start_rank,
            title_self: row.title_self,
            member_permissions: row.member_permissions.into_iter().collect(),
            public_permissions: row.public_permissions.into_iter().collect(),
            locks: Locks::from(row.locks.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct MembershipRow {
    faction_id: i64,
    character_id: Uuid,
    rank: i32,
    rank_permissions: Vec<String>,
    permissions: Vec<String>,
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Self {
            faction_id: row.faction_id,
            character_id: row.character_id,
            rank: row.rank,
            rank_permissions: row.rank_permissions.into_iter().collect::<BTreeSet<_>>(),
            permissions: row.permissions.into_iter().collect(),
        }
    }
}

/// Faction repository
pub struct FactionRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> FactionRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_abbreviation(&self, abbreviation: &str) -> Result<Faction, DbError> {
        let sql = format!(
            "SELECT {FACTION_COLUMNS} FROM factions \
             WHERE LOWER(abbreviation) = LOWER($1) AND deleted_at IS NULL"
        );
        let row: Option<FactionRow> = sqlx::query_as(&sql)
            .bind(abbreviation)
            .fetch_optional(self.pool)
            .await?;

        row.map(Faction::from).ok_or_else(|| DbError::NotFound {
            resource: "faction",
            id: abbreviation.to_owned(),
        })
    }

    pub async fn get(&self, id: i64) -> Result<Faction, DbError> {
        let sql = format!("SELECT {FACTION_COLUMNS} FROM factions WHERE id = $1");
        let row: Option<FactionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Faction::from).ok_or_else(|| DbError::NotFound {
            resource: "faction",
            id: id.to_string(),
        })
    }

    /// Membership with rank permissions; `None` if not a member
    pub async fn membership(
        &self,
        faction_id: i64,
        character_id: Uuid,
    ) -> Result<Option<Membership>, DbError> {
        let row: Option<MembershipRow> = sqlx::query_as(
            r#"
            SELECT
                m.faction_id,
                m.character_id,
                m.rank,
                COALESCE(r.permissions, '{}') AS rank_permissions,
                m.permissions
            FROM faction_members m
            LEFT JOIN faction_ranks r
                ON r.faction_id = m.faction_id AND r.rank = m.rank
            WHERE m.faction_id = $1 AND m.character_id = $2
            "#,
        )
        .bind(faction_id)
        .bind(character_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Membership::from))
    }
}
