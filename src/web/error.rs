//! Error type for page handlers.
//!
//! Recoverable conditions (bad dates, missing projects, username
//! collisions, expired sessions) are handled in the handlers with flash
//! messages and redirects; anything reaching this type is a genuine
//! server-side failure.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    source: anyhow::Error,
}

impl WebError {
    fn new(status: StatusCode, source: anyhow::Error) -> Self {
        Self { status, source }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.source, status = %self.status, "Request failed");
        let body = if self.status == StatusCode::BAD_REQUEST {
            "<h1>400</h1><p>请求无效</p>"
        } else {
            "<h1>500</h1><p>服务器内部错误</p>"
        };
        (self.status, Html(body)).into_response()
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status, self.source)
    }
}

impl From<askama::Error> for WebError {
    fn from(err: askama::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.into())
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

impl From<axum::extract::multipart::MultipartError> for WebError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, err.into())
    }
}
