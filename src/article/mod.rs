//! Articles, their tags and comments.
mod comment;
mod repository;
mod service;

pub use comment::*;
pub use repository::*;
pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 20;

/// Article as saved on database, tags included in display order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub author_id: i64,
    pub favorites_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields given when publishing an article.
#[derive(Clone, Debug, Default)]
pub struct NewArticle {
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
}

/// Partial article update. Absent fields stay untouched.
#[derive(Clone, Debug, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

/// Article listing criteria. Every set criterion must match.
#[derive(Clone, Debug, PartialEq)]
pub struct ListFilter {
    pub tag: Option<String>,
    /// Author username.
    pub author: Option<String>,
    /// Username of someone who favorited the article.
    pub favorited: Option<String>,
    /// Restrict to these authors (feed).
    pub author_ids: Option<Vec<i64>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            tag: None,
            author: None,
            favorited: None,
            author_ids: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Slug derived from the title.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}
