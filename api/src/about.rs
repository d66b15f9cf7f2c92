use axum::response::Html;

const AUTHOR_PAGE: &str = "<!doctype html>
<html lang=\"en\">
<head><meta charset=\"utf-8\"><title>About the author</title></head>
<body>
<h1>About the author</h1>
<p>Yatube is a small blogging service built as a learning project.</p>
</body>
</html>
";

const TECH_PAGE: &str = "<!doctype html>
<html lang=\"en\">
<head><meta charset=\"utf-8\"><title>Technologies</title></head>
<body>
<h1>Technologies</h1>
<ul>
<li>axum and tokio</li>
<li>SQLite through rusqlite and r2d2</li>
<li>moka for the home page cache</li>
</ul>
</body>
</html>
";

/// GET /about/author/
pub async fn author() -> Html<&'static str> {
    Html(AUTHOR_PAGE)
}

/// GET /about/tech/
pub async fn tech() -> Html<&'static str> {
    Html(TECH_PAGE)
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    use crate::testing::{get_request, TestApp};

    #[tokio::test]
    async fn about_pages_are_public_html() {
        let app = TestApp::new();
        for uri in ["/about/author/", "/about/tech/"] {
            let response = app.router().oneshot(get_request(uri, None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
            assert!(content_type.starts_with("text/html"), "{uri}");
        }
    }
}
