use axum::{
    http,
    response::{IntoResponse, Response},
};

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError(error) => write!(f, "{:#}", error),
        }
    }
}

/// Any failure while relaying. Always answered with 400, whether the
/// caller sent garbage or the upstream could not be reached.
pub(crate) struct ProxyError(pub(crate) anyhow::Error);

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        metrics::counter!(crate::metrics::consts::PROXY_BAD_REQUEST).increment(1);
        (
            http::StatusCode::BAD_REQUEST,
            [(http::header::CONTENT_TYPE, "text/plain")],
            format!("ERROR: {}", self),
        )
            .into_response()
    }
}

impl<E> From<E> for ProxyError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
