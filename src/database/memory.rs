//! In-process storage used by tests. Mirrors the PostgreSQL constraints
//! the services rely on: unique email and username, one active follow
//! edge per pair, tags removed with their article.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::article::{Article, ArticlePatch, ArticleRepository, Comment, CommentRepository, ListFilter, NewArticle};
use crate::error::{Result, ServerError};
use crate::social::FollowRepository;
use crate::user::{NewUser, User, UserChanges, UserRepository};

struct FollowRow {
    follower_id: i64,
    followed_id: i64,
    deleted: bool,
}

struct TagRow {
    article_id: i64,
    name: String,
}

/// Per-table id counter, like a `BIGSERIAL` column.
#[derive(Default)]
struct Sequence(i64);

impl Sequence {
    fn bump(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Default)]
struct State {
    user_ids: Sequence,
    article_ids: Sequence,
    comment_ids: Sequence,
    users: BTreeMap<i64, User>,
    follows: Vec<FollowRow>,
    articles: BTreeMap<i64, Article>,
    tags: Vec<TagRow>,
    comments: BTreeMap<i64, Comment>,
}

impl State {
    fn taken(&self, except: Option<i64>, email: Option<&str>, username: Option<&str>) -> Option<&'static str> {
        self.users.values().filter(|u| Some(u.id) != except).find_map(|u| {
            if Some(u.username.as_str()) == username {
                Some("username")
            } else if Some(u.email.as_str()) == email {
                Some("email")
            } else {
                None
            }
        })
    }

    fn with_tags(&self, article: &Article) -> Article {
        let mut article = article.clone();
        article.tag_list = self
            .tags
            .iter()
            .filter(|t| t.article_id == article.id)
            .map(|t| t.name.clone())
            .collect();
        article
    }
}

/// Every repository port over one mutex-guarded state.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Follow rows, tombstones included.
    pub fn follow_rows(&self) -> usize {
        self.state().follows.len()
    }

    pub fn active_edges(&self, follower_id: i64, followed_id: i64) -> usize {
        self.state()
            .follows
            .iter()
            .filter(|f| !f.deleted && f.follower_id == follower_id && f.followed_id == followed_id)
            .count()
    }

    pub fn tag_rows(&self) -> usize {
        self.state().tags.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        let mut state = self.state();
        if let Some(field) = state.taken(None, Some(&user.email), Some(&user.username)) {
            return Err(ServerError::Conflict { field });
        }

        let now = Utc::now();
        let user = User {
            id: state.user_ids.bump(),
            email: user.email.clone(),
            username: user.username.clone(),
            password: user.password.clone(),
            bio: None,
            image: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.state().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.state().users.values().find(|u| u.username == username).cloned())
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.state().users.values().any(|u| u.email == email))
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>> {
        let mut state = self.state();
        if let Some(field) = state.taken(Some(id), changes.email.as_deref(), changes.username.as_deref()) {
            return Err(ServerError::Conflict { field });
        }

        let Some(user) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(username) = &changes.username {
            user.username = username.clone();
        }
        if let Some(password) = &changes.password {
            user.password = password.clone();
        }
        if changes.bio.is_some() {
            user.bio = changes.bio.clone();
        }
        if changes.image.is_some() {
            user.image = changes.image.clone();
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        if follower_id == followed_id {
            return Err(ServerError::internal("follows_check violated"));
        }

        let mut state = self.state();
        let active = state
            .follows
            .iter()
            .any(|f| !f.deleted && f.follower_id == follower_id && f.followed_id == followed_id);
        if active {
            return Ok(false);
        }

        state.follows.push(FollowRow {
            follower_id,
            followed_id,
            deleted: false,
        });
        Ok(true)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let mut state = self.state();
        let mut changed = false;
        for row in state
            .follows
            .iter_mut()
            .filter(|f| !f.deleted && f.follower_id == follower_id && f.followed_id == followed_id)
        {
            row.deleted = true;
            changed = true;
        }

        Ok(changed)
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        Ok(self.active_edges(follower_id, followed_id) > 0)
    }

    async fn followed_ids(&self, follower_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .state()
            .follows
            .iter()
            .filter(|f| !f.deleted && f.follower_id == follower_id)
            .map(|f| f.followed_id)
            .collect())
    }
}

#[async_trait]
impl ArticleRepository for MemoryStore {
    async fn create(&self, author_id: i64, slug: &str, article: &NewArticle) -> Result<Article> {
        let mut state = self.state();
        let now = Utc::now();
        let row = Article {
            id: state.article_ids.bump(),
            slug: slug.to_owned(),
            title: article.title.clone(),
            description: article.description.clone(),
            body: article.body.clone(),
            tag_list: Vec::new(),
            author_id,
            favorites_count: 0,
            created_at: now,
            updated_at: now,
        };

        for name in &article.tag_list {
            state.tags.push(TagRow {
                article_id: row.id,
                name: name.clone(),
            });
        }
        state.articles.insert(row.id, row.clone());

        Ok(state.with_tags(&row))
    }

    async fn get(&self, id: i64) -> Result<Option<Article>> {
        let state = self.state();
        Ok(state.articles.get(&id).map(|a| state.with_tags(a)))
    }

    async fn update(&self, id: i64, slug: Option<&str>, patch: &ArticlePatch) -> Result<Option<Article>> {
        let mut state = self.state();
        let Some(article) = state.articles.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(slug) = slug {
            article.slug = slug.to_owned();
        }
        if let Some(title) = &patch.title {
            article.title = title.clone();
        }
        if let Some(description) = &patch.description {
            article.description = description.clone();
        }
        if let Some(body) = &patch.body {
            article.body = body.clone();
        }
        article.updated_at = Utc::now();

        let article = article.clone();
        Ok(Some(state.with_tags(&article)))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut state = self.state();
        state.tags.retain(|t| t.article_id != id);
        state.comments.retain(|_, c| c.article_id != id);

        Ok(state.articles.remove(&id).is_some())
    }

    async fn list(&self, filter: &ListFilter) -> Result<Vec<Article>> {
        let state = self.state();
        let usernames: HashMap<i64, &str> = state
            .users
            .values()
            .map(|u| (u.id, u.username.as_str()))
            .collect();

        let mut articles: Vec<Article> = state
            .articles
            .values()
            .map(|a| state.with_tags(a))
            .filter(|a| filter.tag.as_ref().is_none_or(|tag| a.tag_list.contains(tag)))
            .filter(|a| {
                filter
                    .author
                    .as_deref()
                    .is_none_or(|name| usernames.get(&a.author_id) == Some(&name))
            })
            .filter(|a| filter.author_ids.as_ref().is_none_or(|ids| ids.contains(&a.author_id)))
            .collect();

        articles.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(articles
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, article_id: i64, author_id: i64, body: &str) -> Result<Comment> {
        let mut state = self.state();
        let now = Utc::now();
        let comment = Comment {
            id: state.comment_ids.bump(),
            body: body.to_owned(),
            article_id,
            author_id,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(comment.id, comment.clone());

        Ok(comment)
    }

    async fn get(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.state().comments.get(&id).cloned())
    }

    async fn list(&self, article_id: i64) -> Result<Vec<Comment>> {
        Ok(self
            .state()
            .comments
            .values()
            .filter(|c| c.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.state().comments.remove(&id).is_some())
    }
}
