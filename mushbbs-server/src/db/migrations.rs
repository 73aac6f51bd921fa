//! Schema for users, characters, factions, boards, posts and read receipts
//!
//! Users, characters and factions are owned by other subsystems; the tables
//! are created here so a standalone deployment has somewhere to seed them.

use sqlx::PgPool;

/// Run all migrations. Idempotent.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running BBS migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            admin_level INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS characters (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS factions (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            abbreviation TEXT NOT NULL,
            description TEXT,
            category TEXT NOT NULL DEFAULT 'general',
            private BOOLEAN NOT NULL DEFAULT FALSE,
            hidden BOOLEAN NOT NULL DEFAULT FALSE,
            can_leave BOOLEAN NOT NULL DEFAULT TRUE,
            kick_rank INTEGER NOT NULL DEFAULT 2,
            start_rank INTEGER NOT NULL DEFAULT 5,
            title_self BOOLEAN NOT NULL DEFAULT FALSE,
            member_permissions TEXT[] NOT NULL DEFAULT '{}',
            public_permissions TEXT[] NOT NULL DEFAULT '{}',
            locks JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS factions_abbreviation_live
            ON factions (LOWER(abbreviation)) WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS faction_ranks (
            faction_id BIGINT NOT NULL REFERENCES factions(id) ON DELETE CASCADE,
            rank INTEGER NOT NULL,
            name TEXT NOT NULL,
            permissions TEXT[] NOT NULL DEFAULT '{}',
            PRIMARY KEY (faction_id, rank)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS faction_members (
            faction_id BIGINT NOT NULL REFERENCES factions(id) ON DELETE CASCADE,
            character_id UUID NOT NULL REFERENCES characters(id) ON DELETE CASCADE,
            rank INTEGER NOT NULL,
            permissions TEXT[] NOT NULL DEFAULT '{}',
            PRIMARY KEY (faction_id, character_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS boards (
            id BIGSERIAL PRIMARY KEY,
            faction_id BIGINT REFERENCES factions(id) ON DELETE RESTRICT,
            board_order INTEGER NOT NULL CHECK (board_order >= 0),
            name TEXT NOT NULL,
            description TEXT,
            anonymous_name TEXT,
            locks JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Public boards share the faction scope 0
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS boards_faction_order_live
            ON boards (COALESCE(faction_id, 0), board_order) WHERE deleted_at IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS board_posts (
            id BIGSERIAL PRIMARY KEY,
            board_id BIGINT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
            post_order INTEGER NOT NULL,
            sub_order INTEGER NOT NULL DEFAULT 0,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            user_id UUID NOT NULL REFERENCES users(id),
            character_id UUID REFERENCES characters(id) ON DELETE SET NULL,
            spoofed_name TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            deleted_at TIMESTAMPTZ,
            UNIQUE (board_id, post_order, sub_order)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS board_posts_read (
            post_id BIGINT NOT NULL REFERENCES board_posts(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            read_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (post_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE OR REPLACE VIEW board_view AS
        SELECT
            b.id,
            COALESCE(f.abbreviation, '') || b.board_order::TEXT AS board_key,
            b.name,
            b.description,
            b.anonymous_name,
            b.faction_id,
            f.name AS faction_name,
            f.abbreviation AS faction_abbreviation,
            b.board_order,
            b.locks,
            b.created_at,
            b.updated_at,
            b.deleted_at
        FROM boards b
        LEFT JOIN factions f ON f.id = b.faction_id
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE OR REPLACE VIEW board_post_view AS
        SELECT
            p.id,
            p.board_id,
            p.post_order,
            p.sub_order,
            p.title,
            p.body,
            p.user_id,
            p.character_id,
            c.name AS character_name,
            p.spoofed_name,
            p.created_at,
            p.modified_at,
            p.deleted_at
        FROM board_posts p
        LEFT JOIN characters c ON c.id = p.character_id
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("BBS migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn migrations_are_idempotent() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");

        run(&pool).await.expect("first run failed");
        run(&pool).await.expect("second run failed");
    }
}
