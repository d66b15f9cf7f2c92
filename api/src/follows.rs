use axum::{
    extract::{Path, State},
    response::Redirect,
};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::{auth::AuthUser, db, error::Result, urls, AppState};

pub fn is_following(conn: &Connection, user_id: i64, author_id: i64) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = ?1 AND author_id = ?2)",
        params![user_id, author_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Records that `user_id` follows `author_id`. Returns whether a new edge was
/// created; following yourself or an author you already follow is a no-op.
/// Uniqueness is left to the `UNIQUE(user_id, author_id)` constraint so that
/// concurrent requests cannot create duplicates.
pub fn follow(conn: &Connection, user_id: i64, author_id: i64) -> Result<bool> {
    if user_id == author_id {
        return Ok(false);
    }

    let inserted = conn.execute(
        "INSERT INTO follows (user_id, author_id) VALUES (?1, ?2)
         ON CONFLICT (user_id, author_id) DO NOTHING",
        params![user_id, author_id],
    )?;
    Ok(inserted > 0)
}

/// Removes the single `user_id` → `author_id` edge. Returns whether one existed.
pub fn unfollow(conn: &Connection, user_id: i64, author_id: i64) -> Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
        params![user_id, author_id],
    )?;
    Ok(deleted > 0)
}

// ── Handlers ──

/// GET /profile/{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(username): Path<String>,
) -> Result<Redirect> {
    let location = urls::profile(&username);

    db::run(&state.db, move |conn| {
        let author = db::find_user(conn, &username)?;
        if follow(conn, viewer.id, author.id)? {
            debug!(user_id = viewer.id, author_id = author.id, "Follow created");
        }
        Ok(())
    })
    .await?;

    Ok(Redirect::to(&location))
}

/// GET /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    viewer: AuthUser,
    Path(username): Path<String>,
) -> Result<Redirect> {
    let location = urls::profile(&username);

    db::run(&state.db, move |conn| {
        let author = db::find_user(conn, &username)?;
        if unfollow(conn, viewer.id, author.id)? {
            debug!(user_id = viewer.id, author_id = author.id, "Follow removed");
        }
        Ok(())
    })
    .await?;

    Ok(Redirect::to(&location))
}
