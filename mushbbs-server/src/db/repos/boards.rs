//! Board repository
//!
//! - lookups and listings read `board_view`, which joins the faction and
//!   derives `board_key`
//! - create relies on the partial unique index over live `(faction, order)`
//! - update locks the row, applies the patch in Rust and writes every column

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use mushbbs_core::models::{Board, BoardChanges, BoardName, Faction};
use mushbbs_core::Locks;

use super::{conflict_on_unique, DbError};

const BOARD_COLUMNS: &str = r#"
    id, board_key, name, description, anonymous_name, faction_id, faction_name,
    faction_abbreviation, board_order, locks, created_at, updated_at, deleted_at
"#;

/// Row shape of `board_view`
#[derive(Debug, Clone, FromRow)]
pub struct BoardRow {
    pub id: i64,
    pub board_key: String,
    pub name: String,
    pub description: Option<String>,
    pub anonymous_name: Option<String>,
    pub faction_id: Option<i64>,
    pub faction_name: Option<String>,
    pub faction_abbreviation: Option<String>,
    pub board_order: i32,
    pub locks: Json<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<BoardRow> for Board {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.id,
            board_key: row.board_key,
            name: row.name,
            description: row.description,
            anonymous_name: row.anonymous_name,
            faction_id: row.faction_id,
            faction_name: row.faction_name,
            faction_abbreviation: row.faction_abbreviation,
            board_order: row.board_order,
            locks: Locks::from(row.locks.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Board repository
pub struct BoardRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> BoardRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Case-insensitive key lookup among live boards
    pub async fn get_by_key(&self, board_key: &str) -> Result<Board, DbError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM board_view \
             WHERE LOWER(board_key) = LOWER($1) AND deleted_at IS NULL"
        );
        let row: Option<BoardRow> = sqlx::query_as(&sql)
            .bind(board_key)
            .fetch_optional(self.pool)
            .await?;

        row.map(Board::from).ok_or_else(|| DbError::NotFound {
            resource: "board",
            id: board_key.to_owned(),
        })
    }

    /// Any board by id, deleted or not
    pub async fn get(&self, id: i64) -> Result<Board, DbError> {
        let sql = format!("SELECT {BOARD_COLUMNS} FROM board_view WHERE id = $1");
        let row: Option<BoardRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Board::from).ok_or_else(|| DbError::NotFound {
            resource: "board",
            id: id.to_string(),
        })
    }

    pub async fn list(&self) -> Result<Vec<Board>, DbError> {
        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM board_view WHERE deleted_at IS NULL \
             ORDER BY COALESCE(faction_id, 0), board_order"
        );
        let rows: Vec<BoardRow> = sqlx::query_as(&sql).fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Board::from).collect())
    }

    pub async fn create(
        &self,
        faction: Option<&Faction>,
        board_order: i32,
        name: &BoardName,
    ) -> Result<Board, DbError> {
        let board_key = format!(
            "{}{}",
            faction.map(|f| f.abbreviation.as_str()).unwrap_or_default(),
            board_order
        );

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO boards (faction_id, board_order, name)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(faction.map(|f| f.id))
        .bind(board_order)
        .bind(name.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("board {board_key} already exists")))?;

        self.get(id).await
    }

    pub async fn update(&self, id: i64, changes: &BoardChanges) -> Result<Board, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM boards WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "SELECT {BOARD_COLUMNS} FROM board_view \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        let row: Option<BoardRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let mut board = row.map(Board::from).ok_or_else(|| DbError::NotFound {
            resource: "board",
            id: id.to_string(),
        })?;

        changes.apply(&mut board);
        let locks: BTreeMap<String, String> = board.locks.clone().into();

        sqlx::query(
            r#"
            UPDATE boards
            SET name = $2,
                description = $3,
                anonymous_name = $4,
                board_order = $5,
                locks = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&board.name)
        .bind(board.description.as_deref())
        .bind(board.anonymous_name.as_deref())
        .bind(board.board_order)
        .bind(Json(locks))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("board order {} is already in use", board.board_order)
            })
        })?;

        tx.commit().await?;
        self.get(id).await
    }

    pub async fn soft_delete(&self, id: i64) -> Result<Board, DbError> {
        let result = sqlx::query(
            "UPDATE boards SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "board",
                id: id.to_string(),
            });
        }

        self.get(id).await
    }
}
