use std::convert::Infallible;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Query, State},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::{ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yatube_shared::{AuthPage, LoginForm, SignupForm, User};

use crate::{db, error::Result, AppState};

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_URL: &str = "/auth/login/";

const SESSION_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;
const USERNAME_MAX_LEN: usize = 150;
const PASSWORD_MIN_LEN: usize = 8;

// ── Session token ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub name: String,
    pub exp: u64,
}

impl Claims {
    pub fn new(user: &User) -> Self {
        Self {
            sub: user.id,
            name: user.username.clone(),
            exp: jsonwebtoken::get_current_timestamp() + SESSION_LIFETIME_SECS,
        }
    }
}

pub fn issue_token(user: &User, jwt_secret: &str) -> Result<String> {
    let token = encode(
        &Header::default(),
        &Claims::new(user),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// ── Extractors ──

/// The logged-in user. Anonymous requests are redirected to the login page.
/// Use `Option<AuthUser>` on pages that anonymous viewers may also see.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

fn session_user(parts: &Parts, jwt_secret: &str) -> Option<AuthUser> {
    let jar = CookieJar::from_headers(&parts.headers);
    let token = jar.get(SESSION_COOKIE)?.value().to_owned();

    let data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| debug!(error = %e, "Ignoring invalid session token"))
    .ok()?;

    Some(AuthUser {
        id: data.claims.sub,
        username: data.claims.name,
    })
}

/// Redirect to the login page, carrying the requested location in `next`.
#[derive(Debug)]
pub struct LoginRedirect {
    next: String,
}

impl LoginRedirect {
    pub fn location(&self) -> String {
        format!("{LOGIN_URL}?next={}", urlencoding::encode(&self.next))
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        session_user(parts, &state.jwt_secret).ok_or_else(|| LoginRedirect {
            next: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned()),
        })
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(session_user(parts, &state.jwt_secret))
    }
}

// ── Passwords ──

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())?;
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .and_then(|hash| Argon2::default().verify_password(password.as_bytes(), &hash))
        .is_ok()
}

fn validate_signup(form: &SignupForm) -> Vec<String> {
    let mut errors = Vec::new();
    let username = form.username.trim();

    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        errors.push(format!(
            "Username must be between 1 and {USERNAME_MAX_LEN} characters."
        ));
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.push("Username may contain only letters, digits and @/./+/-/_.".to_string());
    }

    if form.password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "Password must be at least {PASSWORD_MIN_LEN} characters."
        ));
    }

    errors
}

/// Only same-site absolute paths are honoured as post-login targets.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") => n,
        _ => "/",
    }
}

// ── Handlers ──

#[derive(Deserialize)]
pub struct LoginParams {
    next: Option<String>,
}

/// GET /auth/signup/
pub async fn signup_page() -> Json<AuthPage> {
    Json(AuthPage::default())
}

/// POST /auth/signup/
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let errors = validate_signup(&form);
    if !errors.is_empty() {
        return Ok(Json(AuthPage {
            username: form.username,
            next: None,
            errors,
        })
        .into_response());
    }

    let username = form.username.trim().to_owned();
    let password = form.password;

    let created = db::run(&state.db, move |conn| {
        let password_hash = hash_password(&password)?;
        let inserted = conn.execute(
            "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
            [&username, &password_hash],
        );
        match inserted {
            Ok(_) => Ok(Some(User {
                id: conn.last_insert_rowid(),
                username,
            })),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    })
    .await?;

    let Some(user) = created else {
        return Ok(Json(AuthPage {
            username: form.username,
            next: None,
            errors: vec!["A user with that username already exists.".to_string()],
        })
        .into_response());
    };

    info!(user_id = user.id, username = %user.username, "User signed up");
    let token = issue_token(&user, &state.jwt_secret)?;
    Ok((jar.add(session_cookie(token)), Redirect::to("/")).into_response())
}

/// GET /auth/login/?next=...
pub async fn login_page(Query(params): Query<LoginParams>) -> Json<AuthPage> {
    Json(AuthPage {
        next: params.next,
        ..AuthPage::default()
    })
}

/// POST /auth/login/
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let username = form.username.clone();
    let password = form.password.clone();

    let user = db::run(&state.db, move |conn| {
        let row = conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                [&username],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        },
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        Ok(row
            .filter(|(_, hash)| verify_password(&password, hash))
            .map(|(user, _)| user))
    })
    .await?;

    let Some(user) = user else {
        return Ok(Json(AuthPage {
            username: form.username,
            next: form.next,
            errors: vec!["Please enter a correct username and password.".to_string()],
        })
        .into_response());
    };

    debug!(user_id = user.id, "User logged in");
    let token = issue_token(&user, &state.jwt_secret)?;
    let target = safe_next(form.next.as_deref()).to_owned();
    Ok((jar.add(session_cookie(token)), Redirect::to(&target)).into_response())
}

/// GET /auth/logout/
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::testing::{body_json, form_request, TestApp};

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not a phc string"));
    }

    #[test]
    fn signup_validation() {
        let form = |username: &str, password: &str| SignupForm {
            username: username.to_string(),
            password: password.to_string(),
        };
        assert!(validate_signup(&form("leo", "longenough")).is_empty());
        assert_eq!(validate_signup(&form("", "longenough")).len(), 1);
        assert_eq!(validate_signup(&form("bad name", "longenough")).len(), 1);
        assert_eq!(validate_signup(&form("leo", "short")).len(), 1);
    }

    #[test]
    fn next_must_be_a_local_path() {
        assert_eq!(safe_next(Some("/create/")), "/create/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[tokio::test]
    async fn anonymous_user_is_sent_to_login_with_next() {
        let app = TestApp::new();
        let response = app
            .router()
            .oneshot(Request::get("/follow/?page=2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn forged_token_is_treated_as_anonymous() {
        let app = TestApp::new();
        let user = app.user("someone");
        let forged = issue_token(&user, "some other secret").unwrap();

        let response = app
            .router()
            .oneshot(
                Request::get("/follow/")
                    .header(header::COOKIE, format!("{SESSION_COOKIE}={forged}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn signup_then_login() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(form_request(
                "/auth/signup/",
                None,
                "username=leo&password=longenough",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with(SESSION_COOKIE));

        let response = app
            .router()
            .oneshot(form_request(
                "/auth/login/",
                None,
                "username=leo&password=longenough&next=%2Ffollow%2F",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/follow/");
    }

    #[tokio::test]
    async fn duplicate_signup_is_a_form_error() {
        let app = TestApp::new();
        app.user("leo");

        let response = app
            .router()
            .oneshot(form_request(
                "/auth/signup/",
                None,
                "username=leo&password=longenough",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page: AuthPage = body_json(response).await;
        assert_eq!(page.errors.len(), 1);
    }

    #[tokio::test]
    async fn wrong_password_is_a_form_error() {
        let app = TestApp::new();
        app.user("leo");

        let response = app
            .router()
            .oneshot(form_request(
                "/auth/login/",
                None,
                "username=leo&password=wrongpassword",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let page: AuthPage = body_json(response).await;
        assert!(!page.errors.is_empty());
        assert_eq!(page.username, "leo");
    }
}
