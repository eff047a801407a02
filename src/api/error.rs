use crate::error::FoodgramError;
use crate::pagination::InvalidPage;
use crate::validation::FieldErrors;
use axum::extract::rejection::JsonRejection;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Malformed(String),

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Not found.")]
    NotFound,

    #[error("Invalid page.")]
    InvalidPage,

    #[error("Internal error: {0}")]
    Internal(#[from] FoodgramError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<InvalidPage> for ApiError {
    fn from(_: InvalidPage) -> Self {
        ApiError::InvalidPage
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(format!("JSON parse error - {}", rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) | ApiError::Malformed(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotAuthenticated | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::InvalidPage => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!(errors),
            ApiError::BadRequest(message) => json!({ "errors": message }),
            ApiError::Internal(e) => {
                error!("Request failed: {}", e);
                json!({ "detail": "Internal server error." })
            }
            other => json!({ "detail": other.to_string() }),
        };
        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Token"));
        }
        response
    }
}
