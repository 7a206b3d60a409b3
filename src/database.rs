//! database (db) union structure.
#[cfg(test)]
pub mod memory;

use std::sync::Arc;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::article::{ArticleRepository, CommentRepository, PgArticleRepository, PgCommentRepository};
use crate::social::{FollowRepository, PgFollowRepository};
use crate::user::{PgUserRepository, UserRepository};

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "conduit";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Connect to PostgreSQL and run pending migrations.
pub async fn connect(
    hostname: &str,
    username: &str,
    password: &str,
    db: &str,
    pool: u32,
) -> Result<PgPool, sqlx::Error> {
    let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
    let postgres = connect_url(&addr, pool).await?;

    tracing::info!(%hostname, %db, "postgres connected");

    Ok(postgres)
}

/// Connect using a full `postgres://` URL and run pending migrations.
pub async fn connect_url(url: &str, pool: u32) -> Result<PgPool, sqlx::Error> {
    let postgres = PgPoolOptions::new().max_connections(pool).connect(url).await?;
    sqlx::migrate!().run(&postgres).await?;

    Ok(postgres)
}

/// Every storage collaborator used by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            follows: Arc::new(PgFollowRepository::new(pool.clone())),
            articles: Arc::new(PgArticleRepository::new(pool.clone())),
            comments: Arc::new(PgCommentRepository::new(pool)),
        }
    }

    /// Repositories backed by one in-process store.
    #[cfg(test)]
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());

        Self {
            users: store.clone(),
            follows: store.clone(),
            articles: store.clone(),
            comments: store,
        }
    }
}
