use std::sync::Arc;

use axum::extract::FromRef;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::social::{FollowRepository, Profile};
use crate::user::{User, UserRepository};

/// Social graph: who follows whom, and profiles seen through it.
#[derive(Clone)]
pub struct SocialGraph {
    follows: Arc<dyn FollowRepository>,
    users: Arc<dyn UserRepository>,
}

impl SocialGraph {
    /// Create a new [`SocialGraph`].
    pub fn new(follows: Arc<dyn FollowRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { follows, users }
    }

    async fn target(&self, user_id: i64) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(ServerError::NotFound { resource: "profile" })
    }

    /// Follow `target_id`. Following twice keeps a single edge.
    pub async fn follow(&self, follower_id: i64, target_id: i64) -> Result<Profile> {
        if follower_id == target_id {
            return Err(ServerError::SelfFollow);
        }

        let target = self.target(target_id).await?;
        if self.follows.follow(follower_id, target_id).await? {
            tracing::info!(follower_id, target_id, "user followed");
        }

        Ok(Profile::new(&target, true))
    }

    /// Stop following `target_id`. Not following is not an error.
    pub async fn unfollow(&self, follower_id: i64, target_id: i64) -> Result<Profile> {
        let target = self.target(target_id).await?;
        if self.follows.unfollow(follower_id, target_id).await? {
            tracing::info!(follower_id, target_id, "user unfollowed");
        }

        Ok(Profile::new(&target, false))
    }

    /// Whether `follower_id` actively follows `target_id`.
    pub async fn is_following(&self, follower_id: i64, target_id: i64) -> Result<bool> {
        if follower_id == target_id {
            return Ok(false);
        }

        self.follows.is_following(follower_id, target_id).await
    }

    /// Users actively followed by `follower_id`.
    pub async fn followed_ids(&self, follower_id: i64) -> Result<Vec<i64>> {
        self.follows.followed_ids(follower_id).await
    }

    /// Profile of `target_id` as seen by `viewer_id`.
    pub async fn profile(&self, viewer_id: i64, target_id: i64) -> Result<Profile> {
        let target = self.target(target_id).await?;
        self.author(viewer_id, &target).await
    }

    /// Project an already loaded user for `viewer_id`.
    pub async fn author(&self, viewer_id: i64, user: &User) -> Result<Profile> {
        let following = self.is_following(viewer_id, user.id).await?;
        Ok(Profile::new(user, following))
    }
}

impl FromRef<AppState> for SocialGraph {
    fn from_ref(state: &AppState) -> SocialGraph {
        state.social.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryStore;
    use crate::error::ErrorKind;
    use crate::user::NewUser;

    async fn graph() -> (SocialGraph, Arc<MemoryStore>, i64, i64) {
        let store = Arc::new(MemoryStore::default());
        let mut ids = Vec::new();
        for name in ["jake", "ann"] {
            let user = store
                .insert(&NewUser {
                    username: name.into(),
                    email: format!("{name}@conduit.dev"),
                    password: "hash".into(),
                })
                .await
                .unwrap();
            ids.push(user.id);
        }

        (SocialGraph::new(store.clone(), store.clone()), store, ids[0], ids[1])
    }

    #[tokio::test]
    async fn test_self_follow_writes_nothing() {
        let (graph, store, jake, _) = graph().await;

        let err = graph.follow(jake, jake).await.unwrap_err();

        assert!(matches!(err, ServerError::SelfFollow));
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(store.follow_rows(), 0);
    }

    #[tokio::test]
    async fn test_follow_twice_keeps_one_edge() {
        let (graph, store, jake, ann) = graph().await;

        let profile = graph.follow(jake, ann).await.unwrap();
        graph.follow(jake, ann).await.unwrap();

        assert!(profile.following);
        assert_eq!(profile.username, "ann");
        assert!(graph.is_following(jake, ann).await.unwrap());
        assert_eq!(store.active_edges(jake, ann), 1);
    }

    #[tokio::test]
    async fn test_unfollow_is_idempotent() {
        let (graph, store, jake, ann) = graph().await;
        graph.follow(jake, ann).await.unwrap();

        let profile = graph.unfollow(jake, ann).await.unwrap();
        assert!(!profile.following);
        assert!(!graph.is_following(jake, ann).await.unwrap());

        graph.unfollow(jake, ann).await.unwrap();
        assert_eq!(store.active_edges(jake, ann), 0);
        // The tombstone stays.
        assert_eq!(store.follow_rows(), 1);
    }

    #[tokio::test]
    async fn test_refollow_after_unfollow() {
        let (graph, store, jake, ann) = graph().await;

        graph.follow(jake, ann).await.unwrap();
        graph.unfollow(jake, ann).await.unwrap();
        graph.follow(jake, ann).await.unwrap();
        graph.follow(jake, ann).await.unwrap();

        assert!(graph.is_following(jake, ann).await.unwrap());
        assert_eq!(store.active_edges(jake, ann), 1);
        assert_eq!(graph.followed_ids(jake).await.unwrap(), vec![ann]);
    }

    #[tokio::test]
    async fn test_profile_is_relative_to_viewer() {
        let (graph, _, jake, ann) = graph().await;
        graph.follow(jake, ann).await.unwrap();

        assert!(graph.profile(jake, ann).await.unwrap().following);
        assert!(!graph.profile(ann, jake).await.unwrap().following);
        assert!(!graph.profile(jake, jake).await.unwrap().following);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (graph, _, jake, _) = graph().await;

        assert!(matches!(
            graph.follow(jake, 404).await,
            Err(ServerError::NotFound { resource: "profile" })
        ));
        assert!(graph.unfollow(jake, 404).await.is_err());
    }
}
