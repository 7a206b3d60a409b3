//! Registration, login and the current user.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::Result;
use crate::identity::{CurrentUser, Identity};
use crate::router::Valid;
use crate::token::TokenCodec;
use crate::user::{User, UserChanges, UserDirectory};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 64, message = "can't be blank"))]
    pub username: String,
    #[validate(email(message = "is invalid"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "can't be blank"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterBody {
    #[validate(nested)]
    pub user: Registration,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, message = "can't be blank"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginBody {
    #[validate(nested)]
    pub user: Credentials,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Changes {
    #[validate(email(message = "is invalid"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 64, message = "can't be blank"))]
    pub username: Option<String>,
    #[validate(length(min = 1, max = 255, message = "can't be blank"))]
    pub password: Option<String>,
    pub bio: Option<String>,
    #[validate(url(message = "is invalid"))]
    pub image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateBody {
    #[validate(nested)]
    pub user: Changes,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub user_id: i64,
    pub email: String,
    pub username: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub token: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: UserView,
}

impl Response {
    fn new(user: User, token: String) -> Self {
        Self {
            user: UserView {
                user_id: user.id,
                email: user.email,
                username: user.username,
                bio: user.bio,
                image: user.image,
                token,
            },
        }
    }
}

/// Handler to create user.
pub async fn register(
    State(users): State<UserDirectory>,
    State(codec): State<TokenCodec>,
    Valid(body): Valid<RegisterBody>,
) -> Result<(StatusCode, Json<Response>)> {
    let Registration {
        username,
        email,
        password,
    } = body.user;

    let user = users.register(&username, &email, &password).await?;
    let token = codec.issue(&Identity::from(&user))?;

    Ok((StatusCode::CREATED, Json(Response::new(user, token))))
}

/// Handler to log in.
pub async fn login(
    State(users): State<UserDirectory>,
    State(codec): State<TokenCodec>,
    Valid(body): Valid<LoginBody>,
) -> Result<Json<Response>> {
    let user = users.authenticate(&body.user.email, &body.user.password).await?;
    let token = codec.issue(&Identity::from(&user))?;

    tracing::debug!(user_id = user.id, "user logged in");

    Ok(Json(Response::new(user, token)))
}

/// Handler returning the caller's account with a fresh token.
pub async fn current(
    State(users): State<UserDirectory>,
    State(codec): State<TokenCodec>,
    CurrentUser(identity): CurrentUser,
) -> Result<Json<Response>> {
    let user = users.find_by_id(identity.user_id).await?;
    let token = codec.issue(&Identity::from(&user))?;

    Ok(Json(Response::new(user, token)))
}

/// Handler to update the caller's account.
pub async fn update(
    State(users): State<UserDirectory>,
    State(codec): State<TokenCodec>,
    CurrentUser(identity): CurrentUser,
    Valid(body): Valid<UpdateBody>,
) -> Result<Json<Response>> {
    let Changes {
        email,
        username,
        password,
        bio,
        image,
    } = body.user;

    let user = users
        .update_profile(
            identity.user_id,
            UserChanges {
                email,
                username,
                password,
                bio,
                image,
            },
        )
        .await?;
    // Email or username may have changed: claims follow.
    let token = codec.issue(&Identity::from(&user))?;

    Ok(Json(Response::new(user, token)))
}
