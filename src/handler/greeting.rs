use axum::{http::header, response::IntoResponse};

pub(crate) const GREETING: &str = "Hello, heroku-proxy";

pub(crate) async fn greeting() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], GREETING)
}
