use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres};

use crate::error::Result;

/// Comment left under an article.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub article_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Port for comments persistence.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, article_id: i64, author_id: i64, body: &str) -> Result<Comment>;

    async fn get(&self, id: i64) -> Result<Option<Comment>>;

    /// Comments of an article, oldest first.
    async fn list(&self, article_id: i64) -> Result<Vec<Comment>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgCommentRepository {
    pool: Pool<Postgres>,
}

impl PgCommentRepository {
    /// Create a new [`PgCommentRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(&self, article_id: i64, author_id: i64, body: &str) -> Result<Comment> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (body, article_id, author_id) VALUES ($1, $2, $3)
                RETURNING id, body, article_id, author_id, created_at, updated_at"#,
        )
        .bind(body)
        .bind(article_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get(&self, id: i64) -> Result<Option<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            "SELECT id, body, article_id, author_id, created_at, updated_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list(&self, article_id: i64) -> Result<Vec<Comment>> {
        Ok(sqlx::query_as::<_, Comment>(
            r#"SELECT id, body, article_id, author_id, created_at, updated_at FROM comments
                WHERE article_id = $1 ORDER BY created_at, id"#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance (DATABASE_URL)"]
    async fn test_comment_lifecycle(pool: PgPool) {
        let author = sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (username, email, password) VALUES ('jake', 'jake@jake.jake', 'x') RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        let article = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO articles (slug, title, description, body, author_id)
                VALUES ('a', 'A', '', '', $1) RETURNING id"#,
        )
        .bind(author)
        .fetch_one(&pool)
        .await
        .unwrap();
        let repo = PgCommentRepository::new(pool);

        let first = repo.create(article, author, "Thank you so much!").await.unwrap();
        let second = repo.create(article, author, "Really.").await.unwrap();

        assert_eq!(repo.get(first.id).await.unwrap(), Some(first.clone()));
        assert_eq!(repo.list(article).await.unwrap(), vec![first.clone(), second]);
        assert!(repo.delete(first.id).await.unwrap());
        assert_eq!(repo.get(first.id).await.unwrap(), None);
    }
}
