//! Conduit is a social blogging backend: accounts, follows and articles.
#![forbid(unsafe_code)]

pub mod article;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod identity;
mod router;
pub mod social;
pub mod telemetry;
pub mod token;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::{get, post};
use axum::{Router, middleware as AxumMiddleware};
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

use article::ArticleCatalog;
use config::Configuration;
use crypto::PasswordManager;
use database::Repositories;
use social::SocialGraph;
use token::TokenCodec;
use user::UserDirectory;

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Configuration>,
    pub token: TokenCodec,
    pub users: UserDirectory,
    pub social: SocialGraph,
    pub articles: ArticleCatalog,
}

impl AppState {
    /// Wire services over `repos`.
    pub fn new(config: Arc<Configuration>, repos: Repositories, pwd: PasswordManager) -> error::Result<Self> {
        let token = TokenCodec::new(
            &config.token.secret,
            Duration::from_secs(config.token.ttl_hours * 60 * 60),
        );
        let users = UserDirectory::new(Arc::clone(&repos.users), Arc::new(pwd))?;
        let social = SocialGraph::new(repos.follows, repos.users);
        let articles = ArticleCatalog::new(repos.articles, repos.comments);

        Ok(AppState {
            config,
            token,
            users,
            social,
            articles,
        })
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    // Every route below requires `Authorization: Token <jwt>`.
    let protected = Router::new()
        .route("/user", get(router::users::current).put(router::users::update))
        .route("/profiles/{user_id}", get(router::profiles::get))
        .route(
            "/profiles/{user_id}/follow",
            post(router::profiles::follow).delete(router::profiles::unfollow),
        )
        .route("/articles", get(router::articles::list).post(router::articles::create))
        .route("/articles/feed", get(router::articles::feed))
        .route(
            "/articles/{id}",
            get(router::articles::get)
                .put(router::articles::update)
                .delete(router::articles::delete),
        )
        .route("/articles/{id}/comments", post(router::articles::comment))
        .route_layer(AxumMiddleware::from_fn_with_state(state.clone(), identity::authenticate));

    let api = Router::new()
        // `POST /users` goes to `register`.
        .route("/users", post(router::users::register))
        // `POST /users/login` goes to `login`.
        .route("/users/login", post(router::users::login))
        .merge(protected);

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = Configuration::default().read();

    if config.token.secret.is_empty() {
        return Err("missing token secret: set `token.secret` on `config.yaml` or `JWT_SECRET`".into());
    }

    let pool = match (&config.database_url, &config.postgres) {
        (Some(url), _) => {
            let pool_size = config
                .postgres
                .as_ref()
                .and_then(|pg| pg.pool_size)
                .unwrap_or(database::DEFAULT_POOL_SIZE);
            database::connect_url(url, pool_size).await?
        },
        (None, Some(pg)) => {
            database::connect(
                &pg.address,
                pg.username.as_deref().unwrap_or(database::DEFAULT_CREDENTIALS),
                pg.password.as_deref().unwrap_or(database::DEFAULT_CREDENTIALS),
                pg.database.as_deref().unwrap_or(database::DEFAULT_DATABASE_NAME),
                pg.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        (None, None) => {
            return Err("missing `postgres` entry on `config.yaml` file or `DATABASE_URL`".into());
        },
    };

    let pwd = PasswordManager::new(config.argon2.clone())?;

    Ok(AppState::new(config, Repositories::postgres(pool), pwd)?)
}
