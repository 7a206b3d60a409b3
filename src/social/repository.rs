//! Follow edges storage.
//!
//! Unfollowing tombstones the active row (`deleted_at`); following again
//! inserts a fresh one. A partial unique index keeps at most one active
//! edge per pair.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::Result;

/// Port for follow edges persistence.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create an active edge unless one exists. Returns whether a row was
    /// written.
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Tombstone the active edge, if any. Returns whether a row changed.
    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Whether an active edge exists.
    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool>;

    /// Ids of every user actively followed by `follower_id`.
    async fn followed_ids(&self, follower_id: i64) -> Result<Vec<i64>>;
}

#[derive(Clone)]
pub struct PgFollowRepository {
    pool: Pool<Postgres>,
}

impl PgFollowRepository {
    /// Create a new [`PgFollowRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PgFollowRepository {
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"INSERT INTO follows (follower_id, followed_id) VALUES ($1, $2)
                ON CONFLICT (follower_id, followed_id) WHERE deleted_at IS NULL DO NOTHING"#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE follows SET deleted_at = NOW()
                WHERE follower_id = $1 AND followed_id = $2 AND deleted_at IS NULL"#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(
                SELECT 1 FROM follows
                WHERE follower_id = $1 AND followed_id = $2 AND deleted_at IS NULL
            )"#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn followed_ids(&self, follower_id: i64) -> Result<Vec<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT followed_id FROM follows WHERE follower_id = $1 AND deleted_at IS NULL",
        )
        .bind(follower_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
