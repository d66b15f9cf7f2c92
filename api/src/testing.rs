//! Shared fixtures for handler tests.

use std::{path::Path, time::Duration};

use axum::{
    body::Body,
    http::{header, request, Request},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use rusqlite::params;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use yatube_shared::{Group, User};

use crate::{auth, cache::IndexCache, db, follows, AppState};

/// A 2x1 transparent GIF.
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\
    \xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\
    \x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

const BOUNDARY: &str = "yatube-test-boundary";

pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open_pool(dir.path().join("test.db").to_str().unwrap()).unwrap();
        db::run_migrations(&pool).unwrap();

        let media_root = dir.path().join("media");
        std::fs::create_dir_all(&media_root).unwrap();

        let state = AppState {
            db: pool,
            jwt_secret: "test-secret".to_string(),
            media_root,
            index_cache: IndexCache::new(Duration::from_secs(60)),
        };
        Self { state, _dir: dir }
    }

    pub fn router(&self) -> Router {
        crate::app(self.state.clone())
    }

    pub fn media_root(&self) -> &Path {
        &self.state.media_root
    }

    pub fn user(&self, username: &str) -> User {
        let conn = self.state.db.get().unwrap();
        let id = db::testing::user(&conn, username);
        User {
            id,
            username: username.to_string(),
        }
    }

    pub fn group(&self, slug: &str) -> Group {
        let conn = self.state.db.get().unwrap();
        db::testing::group(&conn, slug);
        db::find_group(&conn, slug).unwrap()
    }

    pub fn post(&self, author: &User, group: Option<&Group>, text: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        db::testing::post(&conn, author.id, group.map(|g| g.id), text)
    }

    /// Deletes a post behind the app's back, leaving the index cache alone.
    pub fn delete_post(&self, post_id: i64) {
        let conn = self.state.db.get().unwrap();
        conn.execute("DELETE FROM posts WHERE id = ?1", params![post_id])
            .unwrap();
    }

    pub fn follow(&self, user: &User, author: &User) {
        let conn = self.state.db.get().unwrap();
        follows::follow(&conn, user.id, author.id).unwrap();
    }

    pub fn post_count(&self) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap()
    }

    pub fn latest_post_id(&self) -> i64 {
        let conn = self.state.db.get().unwrap();
        conn.query_row("SELECT MAX(id) FROM posts", [], |row| row.get(0))
            .unwrap()
    }

    /// `Cookie` header value carrying a session for `user`.
    pub fn cookie(&self, user: &User) -> String {
        let token = auth::issue_token(user, &self.state.jwt_secret).unwrap();
        format!("{}={token}", auth::SESSION_COOKIE)
    }
}

fn with_cookie(builder: request::Builder, cookie: Option<&str>) -> request::Builder {
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    with_cookie(Request::get(uri), cookie)
        .body(Body::empty())
        .unwrap()
}

/// POST with an `application/x-www-form-urlencoded` body.
pub fn form_request(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    with_cookie(Request::post(uri), cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

/// POST with a `multipart/form-data` body. `file` is sent as the `image`
/// field: (file name, content type, bytes).
pub fn multipart_request(
    uri: &str,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    with_cookie(Request::post(uri), cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json<T: DeserializeOwned>(response: Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
