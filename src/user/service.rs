use std::sync::Arc;

use axum::extract::FromRef;
use validator::{ValidationError, ValidationErrors};

use crate::AppState;
use crate::crypto::PasswordManager;
use crate::error::{Result, ServerError};
use crate::user::{NewUser, User, UserChanges, UserRepository};

/// Verified when the email is unknown so both login failures cost the same.
const DUMMY_PASSWORD: &str = "conduit-dummy-password";

fn blank(field: &'static str) -> ServerError {
    let mut errors = ValidationErrors::new();
    errors.add(
        field,
        ValidationError::new("blank").with_message("can't be blank".into()),
    );
    errors.into()
}

/// User directory: registration, credential checks and profile updates.
#[derive(Clone)]
pub struct UserDirectory {
    repo: Arc<dyn UserRepository>,
    pwd: Arc<PasswordManager>,
    dummy_hash: Arc<str>,
}

impl UserDirectory {
    /// Create a new [`UserDirectory`].
    pub fn new(repo: Arc<dyn UserRepository>, pwd: Arc<PasswordManager>) -> Result<Self> {
        let dummy_hash = pwd.hash_password(DUMMY_PASSWORD)?.into();

        Ok(Self {
            repo,
            pwd,
            dummy_hash,
        })
    }

    /// Hash on the blocking pool: Argon2 is slow on purpose.
    async fn hash(&self, password: &str) -> Result<String> {
        let pwd = Arc::clone(&self.pwd);
        let password = password.to_owned();

        Ok(tokio::task::spawn_blocking(move || pwd.hash_password(password))
            .await
            .map_err(ServerError::internal)??)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let pwd = Arc::clone(&self.pwd);
        let password = password.to_owned();
        let hash = hash.to_owned();

        Ok(tokio::task::spawn_blocking(move || pwd.verify_password(password, &hash))
            .await
            .map_err(ServerError::internal)??)
    }

    /// Create an account.
    ///
    /// The email pre-check gives a friendly error; the unique constraint on
    /// storage stays the real guarantee against concurrent registrations.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        for (field, value) in [("username", username), ("email", email), ("password", password)] {
            if value.is_empty() {
                return Err(blank(field));
            }
        }

        if self.repo.email_exists(email).await? {
            return Err(ServerError::Conflict { field: "email" });
        }

        let user = self
            .repo
            .insert(&NewUser {
                username: username.to_owned(),
                email: email.to_owned(),
                password: self.hash(password).await?,
            })
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        metrics::counter!("users_registered_total").increment(1);

        Ok(user)
    }

    /// Check credentials. Unknown email and wrong password are
    /// indistinguishable for the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        if email.is_empty() {
            return Err(blank("email"));
        }

        let Some(user) = self.repo.find_by_email(email).await? else {
            let _ = self.verify(password, &self.dummy_hash).await?;
            metrics::counter!("auth_failures_total", "reason" => "credentials").increment(1);
            return Err(ServerError::InvalidCredentials);
        };

        if !self.verify(password, &user.password).await? {
            tracing::info!(user_id = user.id, "wrong password");
            metrics::counter!("auth_failures_total", "reason" => "credentials").increment(1);
            return Err(ServerError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Find a user using `id` field.
    pub async fn find_by_id(&self, id: i64) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(ServerError::NotFound { resource: "user" })
    }

    /// Find a user using `username` field.
    pub async fn find_by_username(&self, username: &str) -> Result<User> {
        self.repo
            .find_by_username(username)
            .await?
            .ok_or(ServerError::NotFound { resource: "user" })
    }

    /// Partial profile update. The password is re-hashed only when a new
    /// one is given.
    pub async fn update_profile(&self, user_id: i64, mut changes: UserChanges) -> Result<User> {
        let current = self.find_by_id(user_id).await?;

        if changes.is_empty() {
            return Ok(current);
        }

        if let Some(email) = changes.email.as_deref() {
            if email.is_empty() {
                return Err(blank("email"));
            }
            if email != current.email && self.repo.email_exists(email).await? {
                return Err(ServerError::Conflict { field: "email" });
            }
        }

        if let Some(password) = changes.password.take() {
            if password.is_empty() {
                return Err(blank("password"));
            }
            changes.password = Some(self.hash(&password).await?);
        }

        let user = self
            .repo
            .update(user_id, &changes)
            .await?
            .ok_or(ServerError::NotFound { resource: "user" })?;

        tracing::info!(user_id, "user updated");
        Ok(user)
    }
}

impl FromRef<AppState> for UserDirectory {
    fn from_ref(state: &AppState) -> UserDirectory {
        state.users.clone()
    }
}
