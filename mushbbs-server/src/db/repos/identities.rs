//! User/character binding

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use mushbbs_core::models::{ActingIdentity, Character, User};

use super::DbError;

#[derive(Debug, FromRow)]
struct ActingRow {
    user_id: Uuid,
    username: String,
    admin_level: i32,
    character_id: Uuid,
    character_name: String,
}

/// Identity repository
pub struct IdentityRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> IdentityRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The character must belong to the user
    pub async fn find_acting(
        &self,
        user_id: Uuid,
        character_id: Uuid,
    ) -> Result<ActingIdentity, DbError> {
        let row: Option<ActingRow> = sqlx::query_as(
            r#"
            SELECT
                u.id AS user_id,
                u.username,
                u.admin_level,
                c.id AS character_id,
                c.name AS character_name
            FROM characters c
            JOIN users u ON u.id = c.user_id
            WHERE c.id = $1 AND u.id = $2
            "#,
        )
        .bind(character_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        let row = row.ok_or_else(|| DbError::NotFound {
            resource: "character",
            id: character_id.to_string(),
        })?;

        Ok(ActingIdentity::new(
            User {
                id: row.user_id,
                username: row.username,
                admin_level: row.admin_level,
            },
            Character {
                id: row.character_id,
                user_id: row.user_id,
                name: row.character_name,
            },
        ))
    }
}
