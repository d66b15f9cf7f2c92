//! Locations the handlers redirect to.

pub fn profile(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

pub fn post_detail(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}
