use axum::{
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use yatube_shared::{Comment, CommentForm, FieldError, PostDetail, PostFormPage, User};

use crate::{
    auth::AuthUser,
    db,
    error::Result,
    media::{self, Upload},
    urls, AppState,
};

/// Fields of the create/edit form as submitted.
#[derive(Debug, Default)]
struct PostSubmission {
    text: String,
    group: Option<String>,
    image: Option<Upload>,
}

async fn read_submission(mut multipart: Multipart) -> Result<PostSubmission> {
    let mut submission = PostSubmission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "text" => submission.text = field.text().await?,
            "group" => submission.group = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let content_type = field.content_type().map(str::to_owned);
                let data = field.bytes().await?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() || !data.is_empty() {
                    submission.image = Some(Upload {
                        file_name,
                        content_type,
                        data,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

/// A submission that passed validation.
struct CleanPost {
    text: String,
    group_id: Option<i64>,
}

fn field_error(field: &str, message: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate(
    conn: &Connection,
    submission: &PostSubmission,
) -> Result<std::result::Result<CleanPost, Vec<FieldError>>> {
    let mut errors = Vec::new();

    let text = submission.text.trim().to_owned();
    if text.is_empty() {
        errors.push(field_error("text", "This field is required."));
    }

    let group_id = match submission.group.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let known = match raw.parse::<i64>() {
                Ok(id) => conn
                    .query_row("SELECT id FROM groups WHERE id = ?1", [id], |row| {
                        row.get::<_, i64>(0)
                    })
                    .optional()?,
                Err(_) => None,
            };
            if known.is_none() {
                errors.push(field_error(
                    "group",
                    "Select a valid choice. That choice is not one of the available choices.",
                ));
            }
            known
        }
    };

    if submission.image.as_ref().is_some_and(|image| !image.is_image()) {
        errors.push(field_error(
            "image",
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        ));
    }

    if errors.is_empty() {
        Ok(Ok(CleanPost { text, group_id }))
    } else {
        Ok(Err(errors))
    }
}

/// Validates against the database; on failure returns the form page to
/// render again.
async fn check(
    state: &AppState,
    submission: PostSubmission,
    is_edit: bool,
) -> Result<std::result::Result<(CleanPost, Option<Upload>), PostFormPage>> {
    db::run(&state.db, move |conn| {
        match validate(conn, &submission)? {
            Ok(clean) => Ok(Ok((clean, submission.image))),
            Err(errors) => Ok(Err(PostFormPage {
                text: submission.text,
                group: submission.group.and_then(|g| g.trim().parse().ok()),
                image: None,
                groups: db::list_groups(conn)?,
                is_edit,
                errors,
            })),
        }
    })
    .await
}

fn author_of(conn: &Connection, post_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT author_id FROM posts WHERE id = ?1",
        [post_id],
        |row| row.get(0),
    )
    .map_err(db::not_found)
}

fn comments_of(conn: &Connection, post_id: i64) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.text, c.created, u.id, u.username
         FROM comments c
         JOIN users u ON c.author_id = u.id
         WHERE c.post_id = ?1
         ORDER BY c.created ASC, c.id ASC",
    )?;
    let comments = stmt
        .query_map([post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                text: row.get(2)?,
                created: row.get(3)?,
                author: User {
                    id: row.get(4)?,
                    username: row.get(5)?,
                },
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}

// ── Handlers ──

/// GET /posts/{id}/
pub async fn post_detail(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetail>> {
    let detail = db::run(&state.db, move |conn| {
        let post = db::find_post(conn, post_id)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
            [post.author.id],
            |row| row.get(0),
        )?;
        let comments = comments_of(conn, post_id)?;
        let can_edit = viewer.is_some_and(|v| v.id == post.author.id);

        Ok(PostDetail {
            post,
            count,
            comments,
            can_edit,
        })
    })
    .await?;

    Ok(Json(detail))
}

/// GET /create/
pub async fn create_page(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<PostFormPage>> {
    let groups = db::run(&state.db, |conn| db::list_groups(conn)).await?;
    Ok(Json(PostFormPage {
        groups,
        ..PostFormPage::default()
    }))
}

/// POST /create/
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<Response> {
    let submission = read_submission(multipart).await?;
    let (clean, upload) = match check(&state, submission, false).await? {
        Ok(valid) => valid,
        Err(page) => return Ok(Json(page).into_response()),
    };

    let image = match upload {
        Some(upload) => Some(media::store_image(&state.media_root, &upload).await?),
        None => None,
    };

    let author_id = user.id;
    let stored = image.clone();
    let inserted = db::run(&state.db, move |conn| {
        conn.execute(
            "INSERT INTO posts (text, author_id, group_id, image) VALUES (?1, ?2, ?3, ?4)",
            params![clean.text, author_id, clean.group_id, stored],
        )?;
        Ok(conn.last_insert_rowid())
    })
    .await;
    let post_id = match inserted {
        Ok(post_id) => post_id,
        Err(e) => {
            media::discard_image(&state.media_root, image.as_deref()).await;
            return Err(e);
        }
    };

    info!(post_id, author_id, "Post created");
    state.index_cache.clear();
    Ok(Redirect::to(&urls::profile(&user.username)).into_response())
}

/// GET /posts/{id}/edit/
pub async fn edit_page(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Response> {
    let page = db::run(&state.db, move |conn| {
        let post = db::find_post(conn, post_id)?;
        if post.author.id != user.id {
            return Ok(None);
        }
        Ok(Some(PostFormPage {
            text: post.text,
            group: post.group.map(|g| g.id),
            image: post.image,
            groups: db::list_groups(conn)?,
            is_edit: true,
            errors: Vec::new(),
        }))
    })
    .await?;

    Ok(match page {
        Some(page) => Json(page).into_response(),
        None => Redirect::to(&urls::post_detail(post_id)).into_response(),
    })
}

/// POST /posts/{id}/edit/
pub async fn edit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<Response> {
    let author_id = db::run(&state.db, move |conn| author_of(conn, post_id)).await?;
    if author_id != user.id {
        return Ok(Redirect::to(&urls::post_detail(post_id)).into_response());
    }

    let submission = read_submission(multipart).await?;
    let (clean, upload) = match check(&state, submission, true).await? {
        Ok(valid) => valid,
        Err(mut page) => {
            page.image = db::run(&state.db, move |conn| {
                Ok(db::find_post(conn, post_id)?.image)
            })
            .await?;
            return Ok(Json(page).into_response());
        }
    };

    let image = match upload {
        Some(upload) => Some(media::store_image(&state.media_root, &upload).await?),
        None => None,
    };

    let stored = image.clone();
    let updated = db::run(&state.db, move |conn| {
        let previous: Option<String> = conn
            .query_row("SELECT image FROM posts WHERE id = ?1", [post_id], |row| {
                row.get(0)
            })
            .map_err(db::not_found)?;
        conn.execute(
            "UPDATE posts
             SET text = ?1, group_id = ?2, image = COALESCE(?3, image)
             WHERE id = ?4",
            params![clean.text, clean.group_id, stored, post_id],
        )?;
        Ok(previous)
    })
    .await;

    match updated {
        // A new upload replaces the old file.
        Ok(previous) if image.is_some() => {
            media::discard_image(&state.media_root, previous.as_deref()).await;
        }
        Ok(_) => {}
        Err(e) => {
            media::discard_image(&state.media_root, image.as_deref()).await;
            return Err(e);
        }
    }

    info!(post_id, "Post edited");
    state.index_cache.clear();
    Ok(Redirect::to(&urls::post_detail(post_id)).into_response())
}

/// POST /posts/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
) -> Result<Redirect> {
    let user_id = user.id;
    let deleted = db::run(&state.db, move |conn| {
        let (author_id, image): (i64, Option<String>) = conn
            .query_row(
                "SELECT author_id, image FROM posts WHERE id = ?1",
                [post_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db::not_found)?;
        if author_id != user_id {
            return Ok(None);
        }
        conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
        Ok(Some(image))
    })
    .await?;

    let Some(image) = deleted else {
        return Ok(Redirect::to(&urls::post_detail(post_id)));
    };
    media::discard_image(&state.media_root, image.as_deref()).await;

    info!(post_id, "Post deleted");
    state.index_cache.clear();
    Ok(Redirect::to(&urls::profile(&user.username)))
}

/// POST /posts/{id}/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect> {
    let text = form.text.trim().to_owned();

    db::run(&state.db, move |conn| {
        author_of(conn, post_id)?;
        if !text.is_empty() {
            conn.execute(
                "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)",
                params![post_id, user.id, text],
            )?;
        }
        Ok(())
    })
    .await?;

    Ok(Redirect::to(&urls::post_detail(post_id)))
}
