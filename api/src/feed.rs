use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rusqlite::{params_from_iter, Connection};
use yatube_shared::{FollowPage, GroupPage, IndexPage, Page, Post, ProfilePage};

use crate::{
    auth::AuthUser,
    db::{self, POST_COLUMNS, POST_JOINS},
    error::Result,
    follows,
    pagination::{PageParams, Paginator, PAGE_SIZE},
    AppState,
};

/// Which posts a feed shows. Every feed is newest first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Feed {
    Home,
    Group(i64),
    Author(i64),
    /// Posts by authors the given user follows.
    Following(i64),
}

impl Feed {
    fn filter(self) -> (&'static str, Option<i64>) {
        match self {
            Feed::Home => ("1 = 1", None),
            Feed::Group(group_id) => ("p.group_id = ?", Some(group_id)),
            Feed::Author(author_id) => ("p.author_id = ?", Some(author_id)),
            Feed::Following(user_id) => (
                "p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?)",
                Some(user_id),
            ),
        }
    }
}

/// Resolves the requested page against the feed's current size.
pub fn paginate(conn: &Connection, feed: Feed, requested: Option<&str>) -> Result<Paginator> {
    let (filter, arg) = feed.filter();
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM posts p WHERE {filter}"),
        params_from_iter(arg),
        |row| row.get(0),
    )?;
    Ok(Paginator::new(count, PAGE_SIZE, requested))
}

/// Counts the feed, resolves the requested page and fetches its rows.
pub fn compose(conn: &Connection, feed: Feed, requested: Option<&str>) -> Result<Page<Post>> {
    let paginator = paginate(conn, feed, requested)?;
    fetch(conn, feed, paginator)
}

fn fetch(conn: &Connection, feed: Feed, paginator: Paginator) -> Result<Page<Post>> {
    let (filter, arg) = feed.filter();
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS}
         {POST_JOINS}
         WHERE {filter}
         ORDER BY p.pub_date DESC, p.id DESC
         LIMIT ? OFFSET ?"
    ))?;
    let posts = stmt
        .query_map(
            params_from_iter(arg.into_iter().chain([paginator.limit(), paginator.offset()])),
            db::post_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(paginator.page(posts))
}

// ── Handlers ──

/// GET /?page=N
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<IndexPage>> {
    let generation = state.index_cache.generation();
    let paginator = db::run(&state.db, move |conn| {
        paginate(conn, Feed::Home, params.requested())
    })
    .await?;
    let number = paginator.number();

    let page_obj = match state.index_cache.get(number).await {
        Some(page) => page,
        None => {
            let page = db::run(&state.db, move |conn| fetch(conn, Feed::Home, paginator)).await?;
            let page = Arc::new(page);
            state
                .index_cache
                .insert(number, page.clone(), generation)
                .await;
            page
        }
    };

    Ok(Json(IndexPage {
        page_obj: (*page_obj).clone(),
    }))
}

/// GET /group/{slug}/?page=N
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<GroupPage>> {
    let page = db::run(&state.db, move |conn| {
        let group = db::find_group(conn, &slug)?;
        let page_obj = compose(conn, Feed::Group(group.id), params.requested())?;
        Ok(GroupPage { group, page_obj })
    })
    .await?;

    Ok(Json(page))
}

/// GET /profile/{username}/?page=N
pub async fn profile(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(username): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<ProfilePage>> {
    let page = db::run(&state.db, move |conn| {
        let author = db::find_user(conn, &username)?;
        let page_obj = compose(conn, Feed::Author(author.id), params.requested())?;
        let following = match viewer {
            Some(viewer) if viewer.id != author.id => {
                follows::is_following(conn, viewer.id, author.id)?
            }
            _ => false,
        };

        Ok(ProfilePage {
            count: page_obj.count,
            author,
            following,
            page_obj,
        })
    })
    .await?;

    Ok(Json(page))
}

/// GET /follow/?page=N
pub async fn follow_index(
    State(state): State<AppState>,
    viewer: AuthUser,
    Query(params): Query<PageParams>,
) -> Result<Json<FollowPage>> {
    let page_obj = db::run(&state.db, move |conn| {
        compose(conn, Feed::Following(viewer.id), params.requested())
    })
    .await?;

    Ok(Json(FollowPage { page_obj }))
}
