use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Error creating database pool: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Error running migrations: {0}")]
    Migrations(#[from] rusqlite::Error),
    #[error("Error preparing media root: {0}")]
    MediaRoot(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Could not get a database connection: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Multipart body rejected: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Media storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Password hashing failed: {0}")]
    PasswordHash(argon2::password_hash::Error),
    #[error("Session token could not be issued: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Multipart(e) => e.status(),
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Join(_)
            | AppError::Io(_)
            | AppError::PasswordHash(_)
            | AppError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AppError::PasswordHash(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            "Something went wrong".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
