//! Profiles and the follow graph.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identity::CurrentUser;
use crate::router::Params;
use crate::social::{Profile, SocialGraph};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub profile: Profile,
}

/// Handler returning a profile as seen by the caller.
pub async fn get(
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(user_id): Params<i64>,
) -> Result<Json<Response>> {
    let profile = social.profile(identity.user_id, user_id).await?;
    Ok(Json(Response { profile }))
}

pub async fn follow(
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(user_id): Params<i64>,
) -> Result<Json<Response>> {
    let profile = social.follow(identity.user_id, user_id).await?;
    Ok(Json(Response { profile }))
}

pub async fn unfollow(
    State(social): State<SocialGraph>,
    CurrentUser(identity): CurrentUser,
    Params(user_id): Params<i64>,
) -> Result<Json<Response>> {
    let profile = social.unfollow(identity.user_id, user_id).await?;
    Ok(Json(Response { profile }))
}
