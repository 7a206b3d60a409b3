use std::sync::Arc;

use axum::extract::FromRef;
use validator::{ValidationError, ValidationErrors};

use crate::AppState;
use crate::article::{
    Article, ArticlePatch, ArticleRepository, Comment, CommentRepository, ListFilter, NewArticle,
    slugify,
};
use crate::error::{Result, ServerError};

fn invalid(field: &'static str, code: &'static str, message: &'static str) -> ServerError {
    let mut errors = ValidationErrors::new();
    errors.add(field, ValidationError::new(code).with_message(message.into()));
    errors.into()
}

/// Article catalog: publishing, editing, listing and commenting.
#[derive(Clone)]
pub struct ArticleCatalog {
    articles: Arc<dyn ArticleRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl ArticleCatalog {
    /// Create a new [`ArticleCatalog`].
    pub fn new(articles: Arc<dyn ArticleRepository>, comments: Arc<dyn CommentRepository>) -> Self {
        Self { articles, comments }
    }

    /// Publish an article for `author_id`. Its slug comes from the title.
    pub async fn create(&self, author_id: i64, article: NewArticle) -> Result<Article> {
        let slug = slugify(&article.title);
        if slug.is_empty() {
            return Err(invalid("title", "blank", "can't be blank"));
        }

        let article = self.articles.create(author_id, &slug, &article).await?;
        tracing::info!(article_id = article.id, author_id, "article created");

        Ok(article)
    }

    pub async fn get(&self, id: i64) -> Result<Article> {
        self.articles
            .get(id)
            .await?
            .ok_or(ServerError::NotFound { resource: "article" })
    }

    async fn owned(&self, caller: i64, id: i64) -> Result<Article> {
        let article = self.get(id).await?;
        if article.author_id != caller {
            return Err(ServerError::Forbidden);
        }

        Ok(article)
    }

    /// Edit an article. Only its author may. A new title means a new slug.
    pub async fn update(&self, caller: i64, id: i64, patch: ArticlePatch) -> Result<Article> {
        let current = self.owned(caller, id).await?;

        let slug = match patch.title.as_deref() {
            Some(title) if title != current.title => {
                let slug = slugify(title);
                if slug.is_empty() {
                    return Err(invalid("title", "blank", "can't be blank"));
                }
                Some(slug)
            },
            _ => None,
        };

        self.articles
            .update(id, slug.as_deref(), &patch)
            .await?
            .ok_or(ServerError::NotFound { resource: "article" })
    }

    /// Remove an article and its tags. Only its author may.
    pub async fn delete(&self, caller: i64, id: i64) -> Result<Article> {
        let article = self.owned(caller, id).await?;

        if !self.articles.delete(id).await? {
            return Err(ServerError::NotFound { resource: "article" });
        }
        tracing::info!(article_id = id, author_id = caller, "article deleted");

        Ok(article)
    }

    /// List articles, newest first.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<Article>> {
        // Storage refuses a negative LIMIT or OFFSET.
        if filter.limit < 0 {
            return Err(invalid("limit", "range", "must not be negative"));
        }
        if filter.offset < 0 {
            return Err(invalid("offset", "range", "must not be negative"));
        }

        // Favorites are not recorded, so nobody has favorited anything.
        if filter.favorited.is_some() {
            return Ok(Vec::new());
        }

        // An empty feed must not turn into "no author restriction".
        if filter.author_ids.as_ref().is_some_and(Vec::is_empty) {
            return Ok(Vec::new());
        }

        self.articles.list(filter).await
    }

    /// Articles written by `followed` authors.
    pub async fn feed(&self, followed: Vec<i64>, limit: i64, offset: i64) -> Result<Vec<Article>> {
        self.list(&ListFilter {
            author_ids: Some(followed),
            limit,
            offset,
            ..Default::default()
        })
        .await
    }

    /// Comment on an existing article.
    pub async fn add_comment(&self, caller: i64, article_id: i64, body: &str) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(invalid("body", "blank", "can't be blank"));
        }

        let article = self.get(article_id).await?;
        let comment = self.comments.create(article.id, caller, body).await?;
        tracing::debug!(comment_id = comment.id, article_id, "comment added");

        Ok(comment)
    }

    pub async fn comments(&self, article_id: i64) -> Result<Vec<Comment>> {
        let article = self.get(article_id).await?;
        self.comments.list(article.id).await
    }
}

impl FromRef<AppState> for ArticleCatalog {
    fn from_ref(state: &AppState) -> ArticleCatalog {
        state.articles.clone()
    }
}
