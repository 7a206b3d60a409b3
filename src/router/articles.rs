//! Articles, feed and comments.

use std::collections::HashMap;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::article::{Article, ArticleCatalog, ArticlePatch, Comment, DEFAULT_LIMIT, ListFilter, NewArticle};
use crate::error::Result;
use crate::identity::CurrentUser;
use crate::router::{Params, Valid, ValidQuery};
use crate::social::{Profile, SocialGraph};
use crate::user::UserDirectory;

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[validate(length(min = 1, max = 255, message = "can't be blank"))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub body: String,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBody {
    #[validate(nested)]
    pub article: Draft,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Edit {
    #[validate(length(min = 1, max = 255, message = "can't be blank"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "can't be blank"))]
    pub body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateBody {
    #[validate(nested)]
    pub article: Edit,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, message = "can't be blank"))]
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CommentBody {
    #[validate(nested)]
    pub comment: NewComment,
}

/// Query of `GET /articles`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited: Option<String>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub offset: Option<i64>,
}

/// Query of `GET /articles/feed`.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct FeedQuery {
    #[validate(range(min = 0, message = "must not be negative"))]
    pub limit: Option<i64>,
    #[validate(range(min = 0, message = "must not be negative"))]
    pub offset: Option<i64>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleView {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub favorited: bool,
    pub favorites_count: i64,
    pub author: Profile,
}

impl ArticleView {
    fn new(article: Article, author: Profile) -> Self {
        Self {
            id: article.id,
            slug: article.slug,
            title: article.title,
            description: article.description,
            body: article.body,
            tag_list: article.tag_list,
            created_at: article.created_at,
            updated_at: article.updated_at,
            // Favorites are not recorded.
            favorited: false,
            favorites_count: article.favorites_count,
            author,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub article: ArticleView,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub articles: Vec<ArticleView>,
    /// Number of articles in this page, not the total matching the filter.
    pub articles_count: usize,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: Profile,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub comment: CommentView,
}

/// Author profile of a user, as seen by `viewer`.
async fn author(users: &UserDirectory, social: &SocialGraph, viewer: i64, author_id: i64) -> Result<Profile> {
    let user = users.find_by_id(author_id).await?;
    social.author(viewer, &user).await
}

/// Attach authors, loading each one once.
async fn views(
    users: &UserDirectory,
    social: &SocialGraph,
    viewer: i64,
    articles: Vec<Article>,
) -> Result<ListResponse> {
    let mut authors: HashMap<i64, Profile> = HashMap::new();
    let mut views = Vec::with_capacity(articles.len());

    for article in articles {
        let profile = match authors.get(&article.author_id) {
            Some(profile) => profile.clone(),
            None => {
                let profile = author(users, social, viewer, article.author_id).await?;
                authors.insert(article.author_id, profile.clone());
                profile
            },
        };
        views.push(ArticleView::new(article, profile));
    }

    Ok(ListResponse {
        articles_count: views.len(),
        articles: views,
    })
}

/// Handler listing articles.
pub async fn list(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<Json<ListResponse>> {
    let filter = ListFilter {
        tag: query.tag,
        author: query.author,
        favorited: query.favorited,
        author_ids: None,
        limit: query.limit.unwrap_or(DEFAULT_LIMIT),
        offset: query.offset.unwrap_or_default(),
    };

    let articles = catalog.list(&filter).await?;
    Ok(Json(views(&users, &social, identity.user_id, articles).await?))
}

/// Handler listing articles written by followed users.
pub async fn feed(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    ValidQuery(query): ValidQuery<FeedQuery>,
) -> Result<Json<ListResponse>> {
    let followed = social.followed_ids(identity.user_id).await?;
    let articles = catalog
        .feed(
            followed,
            query.limit.unwrap_or(DEFAULT_LIMIT),
            query.offset.unwrap_or_default(),
        )
        .await?;

    Ok(Json(views(&users, &social, identity.user_id, articles).await?))
}

/// Handler to publish an article.
pub async fn create(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Valid(body): Valid<CreateBody>,
) -> Result<(StatusCode, Json<Response>)> {
    let Draft {
        title,
        description,
        body,
        tag_list,
    } = body.article;

    let article = catalog
        .create(
            identity.user_id,
            NewArticle {
                title,
                description,
                body,
                tag_list,
            },
        )
        .await?;
    let author = author(&users, &social, identity.user_id, article.author_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            article: ArticleView::new(article, author),
        }),
    ))
}

pub async fn get(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(id): Params<i64>,
) -> Result<Json<Response>> {
    let article = catalog.get(id).await?;
    let author = author(&users, &social, identity.user_id, article.author_id).await?;

    Ok(Json(Response {
        article: ArticleView::new(article, author),
    }))
}

/// Handler to edit an article. Author only.
pub async fn update(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(id): Params<i64>,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<Response>> {
    let Edit {
        title,
        description,
        body,
    } = body.article;

    let article = catalog
        .update(
            identity.user_id,
            id,
            ArticlePatch {
                title,
                description,
                body,
            },
        )
        .await?;
    let author = author(&users, &social, identity.user_id, article.author_id).await?;

    Ok(Json(Response {
        article: ArticleView::new(article, author),
    }))
}

/// Handler to delete an article. Author only.
pub async fn delete(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(id): Params<i64>,
) -> Result<Json<Response>> {
    let article = catalog.delete(identity.user_id, id).await?;
    let author = author(&users, &social, identity.user_id, article.author_id).await?;

    Ok(Json(Response {
        article: ArticleView::new(article, author),
    }))
}

/// Handler to comment an article.
pub async fn comment(
    State(catalog): State<ArticleCatalog>,
    State(users): State<UserDirectory>,
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(article_id): Params<i64>,
    Valid(payload): Valid<CommentBody>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let Comment {
        id,
        body,
        author_id,
        created_at,
        updated_at,
        ..
    } = catalog
        .add_comment(identity.user_id, article_id, &payload.comment.body)
        .await?;
    let author = author(&users, &social, identity.user_id, author_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            comment: CommentView {
                id,
                body,
                created_at,
                updated_at,
                author,
            },
        }),
    ))
}
