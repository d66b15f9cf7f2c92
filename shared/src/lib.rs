use serde::{Deserialize, Serialize};

// ── Users ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Context of the login and signup pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthPage {
    pub username: String,
    pub next: Option<String>,
    pub errors: Vec<String>,
}

// ── Groups ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

// ── Posts ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub pub_date: String,
    pub author: User,
    pub group: Option<Group>,
    /// Path relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author: User,
    pub text: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

/// Context of the create/edit page. `errors` maps field names to messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFormPage {
    pub text: String,
    pub group: Option<i64>,
    pub image: Option<String>,
    pub groups: Vec<Group>,
    pub is_edit: bool,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

// ── Pages ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub count: i64,
    pub number: i64,
    pub num_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPage {
    pub page_obj: Page<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPage {
    pub group: Group,
    pub page_obj: Page<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilePage {
    pub author: User,
    pub count: i64,
    pub following: bool,
    pub page_obj: Page<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowPage {
    pub page_obj: Page<Post>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    /// Number of posts written by the post's author.
    pub count: i64,
    pub comments: Vec<Comment>,
    pub can_edit: bool,
}
