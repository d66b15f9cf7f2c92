use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Row};
use yatube_shared::{Group, Post, User};

use crate::error::{AppError, Result};

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

pub fn open_pool(database_url: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_url).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });
    r2d2::Pool::new(manager)
}

/// Runs `f` on the blocking pool with a pooled connection.
pub async fn run<T, F>(pool: &DbPool, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(AppError::from)?
}

pub fn run_migrations(pool: &DbPool) -> std::result::Result<(), crate::error::InitError> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            username      TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            date_joined   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );

        CREATE TABLE IF NOT EXISTS groups (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            slug        TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            text        TEXT NOT NULL,
            pub_date    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            group_id    INTEGER REFERENCES groups(id) ON DELETE SET NULL,
            image       TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
        CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id);

        CREATE TABLE IF NOT EXISTS comments (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            created     TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

        CREATE TABLE IF NOT EXISTS follows (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            author_id   INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            UNIQUE(user_id, author_id),
            CHECK(user_id <> author_id)
        );
        CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id);
        ",
    )?;

    Ok(())
}

// ── Lookups shared by the feed, post and follow handlers ──

/// Columns expected by [`post_from_row`], in order.
pub const POST_COLUMNS: &str = "p.id, p.text, p.pub_date, p.image,
        u.id, u.username,
        g.id, g.title, g.slug, g.description";

/// Joins for [`POST_COLUMNS`]; the post table is aliased `p`.
pub const POST_JOINS: &str = "FROM posts p
        JOIN users u ON p.author_id = u.id
        LEFT JOIN groups g ON p.group_id = g.id";

pub fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let group_id: Option<i64> = row.get(6)?;
    let group = match group_id {
        Some(id) => Some(Group {
            id,
            title: row.get(7)?,
            slug: row.get(8)?,
            description: row.get(9)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        pub_date: row.get(2)?,
        image: row.get(3)?,
        author: User {
            id: row.get(4)?,
            username: row.get(5)?,
        },
        group,
    })
}

pub fn find_post(conn: &Connection, post_id: i64) -> Result<Post> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} {POST_JOINS} WHERE p.id = ?1"),
        [post_id],
        post_from_row,
    )
    .map_err(not_found)
}

pub fn find_user(conn: &Connection, username: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, username FROM users WHERE username = ?1",
        [username],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        },
    )
    .map_err(not_found)
}

pub fn find_group(conn: &Connection, slug: &str) -> Result<Group> {
    conn.query_row(
        "SELECT id, title, slug, description FROM groups WHERE slug = ?1",
        [slug],
        group_from_row,
    )
    .map_err(not_found)
}

pub fn list_groups(conn: &Connection) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare("SELECT id, title, slug, description FROM groups ORDER BY title")?;
    let groups = stmt
        .query_map([], group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

/// Maps a missing row to [`AppError::NotFound`].
pub fn not_found(e: rusqlite::Error) -> AppError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound,
        other => AppError::Database(other),
    }
}
