// HTTP error responses
//
// Every error returned by the HTTP layer serialises as:
//   {"ok": false, "error": {"code": "<code>", "message": "<message>"}}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: HttpErrorResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpErrorResponse {
    pub ok: bool,
    pub error: HttpErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct HttpErrorBody {
    pub code: String,
    pub message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            body: HttpErrorResponse {
                ok: false,
                error: HttpErrorBody {
                    code: code.into(),
                    message: message.into(),
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal(format!("{:#}", err))
    }
}
