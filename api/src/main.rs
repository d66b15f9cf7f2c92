mod about;
mod auth;
mod cache;
mod config;
mod db;
mod error;
mod feed;
mod follows;
mod media;
mod pagination;
mod posts;
mod urls;

#[cfg(test)]
mod testing;

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    cache::IndexCache,
    config::Config,
    db::DbPool,
    error::{AppError, InitError},
};

/// Upper bound for request bodies, post images included.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub index_cache: IndexCache,
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yatube_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn app(state: AppState) -> Router {
    let media = ServeDir::new(&state.media_root);

    Router::new()
        // Feeds
        .route("/", get(feed::index))
        .route("/group/{slug}/", get(feed::group_posts))
        .route("/profile/{username}/", get(feed::profile))
        .route("/follow/", get(feed::follow_index))
        // Posts
        .route("/create/", get(posts::create_page).post(posts::create))
        .route("/posts/{id}/", get(posts::post_detail))
        .route(
            "/posts/{id}/edit/",
            get(posts::edit_page).post(posts::edit),
        )
        .route("/posts/{id}/delete/", post(posts::delete))
        .route("/posts/{id}/comment/", post(posts::add_comment))
        // Follows
        .route("/profile/{username}/follow/", get(follows::profile_follow))
        .route(
            "/profile/{username}/unfollow/",
            get(follows::profile_unfollow),
        )
        // Auth
        .route("/auth/signup/", get(auth::signup_page).post(auth::signup))
        .route("/auth/login/", get(auth::login_page).post(auth::login))
        .route("/auth/logout/", get(auth::logout))
        // About
        .route("/about/author/", get(about::author))
        .route("/about/tech/", get(about::tech))
        .nest_service("/media", media)
        .fallback(|| async { AppError::NotFound })
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let config = Config::from_env()?;

    let pool = db::open_pool(&config.database_url)?;
    db::run_migrations(&pool)?;

    tokio::fs::create_dir_all(&config.media_root)
        .await
        .map_err(InitError::MediaRoot)?;

    let state = AppState {
        db: pool,
        jwt_secret: config.jwt_secret,
        media_root: config.media_root,
        index_cache: IndexCache::new(Duration::from_secs(config.index_cache_seconds)),
    };

    let server_address = SocketAddr::new(config.server_address, config.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Yatube listening");

    axum::serve(listener, app(state))
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
