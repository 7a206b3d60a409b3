//! Articles and tags storage.
//!
//! Tags are a child collection of their article: they are written and
//! removed inside the same transaction as the article row.

use async_trait::async_trait;
use sqlx::{PgConnection, Pool, Postgres};

use crate::article::{Article, ArticlePatch, ListFilter, NewArticle};
use crate::error::Result;

const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id,
        a.slug,
        a.title,
        a.description,
        a.body,
        a.author_id,
        a.favorites_count,
        a.created_at,
        a.updated_at,
        COALESCE(
            ARRAY_AGG(t.name ORDER BY t.position) FILTER (WHERE t.id IS NOT NULL),
            '{}'
        ) AS tag_list
    FROM articles a
    JOIN users u ON u.id = a.author_id
    LEFT JOIN tags t ON t.article_id = a.id
"#;

/// Port for article persistence.
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Insert the article and its tags atomically.
    async fn create(&self, author_id: i64, slug: &str, article: &NewArticle) -> Result<Article>;

    /// Find an article with its tags.
    async fn get(&self, id: i64) -> Result<Option<Article>>;

    /// Apply `patch` (and a new slug when the title changed).
    async fn update(&self, id: i64, slug: Option<&str>, patch: &ArticlePatch) -> Result<Option<Article>>;

    /// Delete the article and its tags atomically. Returns whether it
    /// existed.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Articles matching `filter`, newest first.
    async fn list(&self, filter: &ListFilter) -> Result<Vec<Article>>;
}

#[derive(Clone)]
pub struct PgArticleRepository {
    pool: Pool<Postgres>,
}

impl PgArticleRepository {
    /// Create a new [`PgArticleRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

async fn select_one(conn: &mut PgConnection, id: i64) -> Result<Option<Article>> {
    let query = format!("{ARTICLE_SELECT} WHERE a.id = $1 GROUP BY a.id");

    Ok(sqlx::query_as::<_, Article>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await?)
}

async fn insert_tags(conn: &mut PgConnection, article_id: i64, tags: &[String]) -> Result<()> {
    for (position, tag) in tags.iter().enumerate() {
        sqlx::query("INSERT INTO tags (article_id, name, position) VALUES ($1, $2, $3)")
            .bind(article_id)
            .bind(tag)
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

async fn delete_tags(conn: &mut PgConnection, article_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM tags WHERE article_id = $1")
        .bind(article_id)
        .execute(conn)
        .await?;

    Ok(())
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn create(&self, author_id: i64, slug: &str, article: &NewArticle) -> Result<Article> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO articles (slug, title, description, body, author_id)
                VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(slug)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.body)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await?;

        insert_tags(&mut tx, id, &article.tag_list).await?;
        let created = select_one(&mut tx, id).await?;

        // Dropping `tx` on an early return rolls everything back.
        tx.commit().await?;

        created.ok_or_else(|| crate::error::ServerError::internal("inserted article vanished"))
    }

    async fn get(&self, id: i64) -> Result<Option<Article>> {
        let mut conn = self.pool.acquire().await?;
        select_one(&mut conn, id).await
    }

    async fn update(&self, id: i64, slug: Option<&str>, patch: &ArticlePatch) -> Result<Option<Article>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE articles
                SET slug = COALESCE($1, slug),
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    body = COALESCE($4, body),
                    updated_at = NOW()
                WHERE id = $5"#,
        )
        .bind(slug)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.body)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated = select_one(&mut tx, id).await?;
        tx.commit().await?;

        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        delete_tags(&mut tx, id).await?;
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Article>> {
        let query = format!(
            r#"{ARTICLE_SELECT}
            WHERE ($1::TEXT IS NULL OR EXISTS (
                    SELECT 1 FROM tags ft WHERE ft.article_id = a.id AND ft.name = $1
                ))
                AND ($2::TEXT IS NULL OR u.username = $2)
                AND ($3::BIGINT[] IS NULL OR a.author_id = ANY($3))
            GROUP BY a.id
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $4 OFFSET $5"#
        );

        Ok(sqlx::query_as::<_, Article>(&query)
            .bind(&filter.tag)
            .bind(&filter.author)
            .bind(&filter.author_ids)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await?)
    }
}
