use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use axum::body::Bytes;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::error::Result;

/// Directory under the media root that holds post images.
pub const POST_IMAGES_DIR: &str = "posts";

/// An uploaded file as read from a multipart field.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// Reduces a client-supplied file name to a safe final path component.
fn clean_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn candidate(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{attempt}.{ext}"),
        _ => format!("{file_name}_{attempt}"),
    }
}

/// Writes the upload to `<media_root>/posts/` without overwriting existing
/// files and returns its path relative to the media root.
pub async fn store_image(media_root: &Path, upload: &Upload) -> Result<String> {
    let dir: PathBuf = media_root.join(POST_IMAGES_DIR);
    fs::create_dir_all(&dir).await?;

    let file_name = clean_file_name(&upload.file_name);
    let mut attempt = 0;
    loop {
        let name = candidate(&file_name, attempt);
        let opened = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await;

        match opened {
            Ok(mut file) => {
                file.write_all(&upload.data).await?;
                file.flush().await?;
                let stored = format!("{POST_IMAGES_DIR}/{name}");
                info!(path = %stored, bytes = upload.data.len(), "Stored image");
                return Ok(stored);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Removes a stored image, given its path relative to the media root.
/// Paths outside the post images directory are refused.
pub async fn remove_image(media_root: &Path, stored: &str) -> Result<()> {
    let Some(name) = stored.strip_prefix(&format!("{POST_IMAGES_DIR}/")) else {
        return Ok(());
    };
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Ok(());
    }

    match fs::remove_file(media_root.join(POST_IMAGES_DIR).join(name)).await {
        Ok(()) => {
            info!(path = %stored, "Removed image");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort [`remove_image`] for images no row refers to any more.
pub async fn discard_image(media_root: &Path, stored: Option<&str>) {
    let Some(stored) = stored else {
        return;
    };
    if let Err(e) = remove_image(media_root, stored).await {
        warn!(error = %e, path = %stored, "Could not remove unused image");
    }
}
