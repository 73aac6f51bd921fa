//! Post repository
//!
//! Orders are allocated as `max + 1` over every row on the board, deleted
//! ones included, so a post key is never reused. The board row is locked for
//! the allocation so concurrent posters serialize.

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use mushbbs_core::models::{ActingIdentity, NewPost, Post, PostChanges, PostKey};

use super::{conflict_on_unique, DbError};

const POST_COLUMNS: &str = r#"
    id, board_id, post_order, sub_order, title, body, user_id, character_id,
    character_name, spoofed_name, created_at, modified_at, deleted_at
"#;

/// `fetch` borrows its query string for the life of the stream
const STREAM_POSTS_SQL: &str = r#"
    SELECT id, board_id, post_order, sub_order, title, body, user_id, character_id,
           character_name, spoofed_name, created_at, modified_at, deleted_at
    FROM board_post_view
    WHERE board_id = $1 AND deleted_at IS NULL
    ORDER BY post_order, sub_order
"#;

/// Row shape of `board_post_view`
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: i64,
    pub board_id: i64,
    pub post_order: i32,
    pub sub_order: i32,
    pub title: String,
    pub body: String,
    pub user_id: Uuid,
    pub character_id: Option<Uuid>,
    pub character_name: Option<String>,
    pub spoofed_name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let post_key = PostKey {
            post_order: row.post_order,
            sub_order: row.sub_order,
        }
        .to_string();

        Self {
            id: row.id,
            board_id: row.board_id,
            post_key,
            post_order: row.post_order,
            sub_order: row.sub_order,
            title: row.title,
            body: row.body,
            user_id: row.user_id,
            character_id: row.character_id,
            character_name: row.character_name,
            spoofed_name: row.spoofed_name,
            created_at: row.created_at,
            modified_at: row.modified_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// Post repository
pub struct PostRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> PostRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Post, DbError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM board_post_view WHERE id = $1");
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(Post::from).ok_or_else(|| DbError::NotFound {
            resource: "post",
            id: id.to_string(),
        })
    }

    pub async fn get_by_key(&self, board_id: i64, key: PostKey) -> Result<Post, DbError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM board_post_view \
             WHERE board_id = $1 AND post_order = $2 AND sub_order = $3 AND deleted_at IS NULL"
        );
        let row: Option<PostRow> = sqlx::query_as(&sql)
            .bind(board_id)
            .bind(key.post_order)
            .bind(key.sub_order)
            .fetch_optional(self.pool)
            .await?;

        row.map(Post::from).ok_or_else(|| DbError::NotFound {
            resource: "post",
            id: key.to_string(),
        })
    }

    /// Live posts in thread order, streamed row by row
    pub fn stream_for_board(&self, board_id: i64) -> BoxStream<'a, Result<Post, DbError>> {
        sqlx::query_as::<_, PostRow>(STREAM_POSTS_SQL)
            .bind(board_id)
            .fetch(self.pool)
            .map(|row| row.map(Post::from).map_err(DbError::from))
            .boxed()
    }

    pub async fn create(
        &self,
        board_id: i64,
        post: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post, DbError> {
        let mut tx = self.pool.begin().await?;
        lock_board(&mut tx, board_id).await?;

        let (post_order,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(post_order), 0) + 1 FROM board_posts WHERE board_id = $1",
        )
        .bind(board_id)
        .fetch_one(&mut *tx)
        .await?;

        let id = insert(&mut tx, board_id, PostKey::top_level(post_order), post, author).await?;
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn create_reply(
        &self,
        board_id: i64,
        parent_order: i32,
        reply: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post, DbError> {
        let mut tx = self.pool.begin().await?;
        lock_board(&mut tx, board_id).await?;

        let (sub_order,): (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sub_order), 0) + 1 FROM board_posts \
             WHERE board_id = $1 AND post_order = $2",
        )
        .bind(board_id)
        .bind(parent_order)
        .fetch_one(&mut *tx)
        .await?;

        let key = PostKey {
            post_order: parent_order,
            sub_order,
        };
        let id = insert(&mut tx, board_id, key, reply, author).await?;
        tx.commit().await?;
        self.get(id).await
    }

    pub async fn update(&self, id: i64, changes: &PostChanges) -> Result<Post, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE board_posts
            SET title = COALESCE($2, title),
                body = COALESCE($3, body),
                modified_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.body.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "post",
                id: id.to_string(),
            });
        }

        self.get(id).await
    }

    pub async fn soft_delete(&self, id: i64) -> Result<Post, DbError> {
        let result = sqlx::query(
            "UPDATE board_posts SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound {
                resource: "post",
                id: id.to_string(),
            });
        }

        self.get(id).await
    }

    /// Idempotent
    pub async fn mark_read(&self, post_id: i64, user_id: Uuid) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO board_posts_read (post_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn unread_count(&self, board_id: i64, user_id: Uuid) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM board_posts p
            WHERE p.board_id = $1
              AND p.deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM board_posts_read r
                  WHERE r.post_id = p.id AND r.user_id = $2
              )
            "#,
        )
        .bind(board_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

async fn lock_board(tx: &mut Transaction<'_, Postgres>, board_id: i64) -> Result<(), DbError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM boards WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(board_id)
    .fetch_optional(&mut **tx)
    .await?;

    row.map(|_| ()).ok_or_else(|| DbError::NotFound {
        resource: "board",
        id: board_id.to_string(),
    })
}

/// Insert the post and the author's read receipt; returns the new id
async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    board_id: i64,
    key: PostKey,
    post: &NewPost,
    author: &ActingIdentity,
) -> Result<i64, DbError> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO board_posts
            (board_id, post_order, sub_order, title, body, user_id, character_id, spoofed_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(board_id)
    .bind(key.post_order)
    .bind(key.sub_order)
    .bind(post.title.as_str())
    .bind(post.body.as_str())
    .bind(author.user.id)
    .bind(author.character_id())
    .bind(&author.character.name)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| conflict_on_unique(e, || format!("post {key} already exists")))?;

    sqlx::query("INSERT INTO board_posts_read (post_id, user_id) VALUES ($1, $2)")
        .bind(id)
        .bind(author.user.id)
        .execute(&mut **tx)
        .await?;

    Ok(id)
}
