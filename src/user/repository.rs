//! Handle database requests.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{Result, ServerError};
use crate::user::{NewUser, User, UserChanges};

const USER_COLUMNS: &str = "id, email, username, password, bio, image, created_at, updated_at";

/// Port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. Unique violations surface as [`ServerError::Conflict`].
    async fn insert(&self, user: &NewUser) -> Result<User>;

    /// Find a user using `id` field.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Find a user using `email` field.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Find a user using `username` field.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Whether an account already uses `email`.
    async fn email_exists(&self, email: &str) -> Result<bool>;

    /// Apply `changes` (password already hashed) and return the new row.
    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>>;
}

/// Turn a unique violation on `users` into a conflict on the right field.
fn conflict_or_sql(err: sqlx::Error) -> ServerError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => match db.constraint() {
            Some("users_username_key") => ServerError::Conflict { field: "username" },
            _ => ServerError::Conflict { field: "email" },
        },
        _ => ServerError::Sql(err),
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn find_by(&self, field: Field, value: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE {field} = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, user: &NewUser) -> Result<User> {
        let query = format!(
            "INSERT INTO users (username, email, password) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_or_sql)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_by(Field::Email, email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_by(Field::Username, username).await
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>> {
        let query = format!(
            r#"UPDATE users
                SET email = COALESCE($1, email),
                    username = COALESCE($2, username),
                    password = COALESCE($3, password),
                    bio = COALESCE($4, bio),
                    image = COALESCE($5, image),
                    updated_at = NOW()
                WHERE id = $6
                RETURNING {USER_COLUMNS}"#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&changes.email)
            .bind(&changes.username)
            .bind(&changes.password)
            .bind(&changes.bio)
            .bind(&changes.image)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict_or_sql)
    }
}

enum Field {
    Email,
    Username,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Email => write!(f, "email"),
            Field::Username => write!(f, "username"),
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;

    use super::*;

    fn jake() -> NewUser {
        NewUser {
            username: "jake".into(),
            email: "jake@jake.jake".into(),
            password: "$argon2id$fake".into(),
        }
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance (DATABASE_URL)"]
    async fn test_insert_and_find(pool: PgPool) {
        let repo = PgUserRepository::new(pool);

        let user = repo.insert(&jake()).await.unwrap();
        assert!(user.id > 0);
        assert!(repo.email_exists("jake@jake.jake").await.unwrap());
        assert_eq!(repo.find_by_username("jake").await.unwrap(), Some(user.clone()));
        assert_eq!(repo.find_by_id(user.id).await.unwrap(), Some(user));
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance (DATABASE_URL)"]
    async fn test_unique_constraints(pool: PgPool) {
        let repo = PgUserRepository::new(pool);
        repo.insert(&jake()).await.unwrap();

        let same_email = NewUser {
            username: "other".into(),
            ..jake()
        };
        assert!(matches!(
            repo.insert(&same_email).await,
            Err(ServerError::Conflict { field: "email" })
        ));

        let same_username = NewUser {
            email: "other@jake.jake".into(),
            ..jake()
        };
        assert!(matches!(
            repo.insert(&same_username).await,
            Err(ServerError::Conflict { field: "username" })
        ));
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance (DATABASE_URL)"]
    async fn test_partial_update(pool: PgPool) {
        let repo = PgUserRepository::new(pool);
        let user = repo.insert(&jake()).await.unwrap();

        let changes = UserChanges {
            bio: Some("I like to skateboard".into()),
            ..Default::default()
        };
        let updated = repo.update(user.id, &changes).await.unwrap().unwrap();

        assert_eq!(updated.bio.as_deref(), Some("I like to skateboard"));
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.password, user.password);
        assert!(repo.update(user.id + 1, &changes).await.unwrap().is_none());
    }
}
