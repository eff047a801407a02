//! Request extractors: token authentication and absolute request URLs.

use super::error::ApiError;
use super::state::AppState;
use crate::auth::parse_token_header;
use crate::domain::User;
use crate::query::QueryParams;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, HOST};
use axum::http::request::Parts;
use tracing::debug;

/// The authenticated user, if any. A malformed or unknown token is rejected
/// rather than treated as anonymous.
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Viewer(None));
        };
        let value = header.to_str().map_err(|_| ApiError::InvalidToken)?;
        let is_token_scheme = value
            .split_whitespace()
            .next()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("token"));
        if !is_token_scheme {
            // Other schemes are not ours to judge
            return Ok(Viewer(None));
        }
        let key = parse_token_header(value).ok_or(ApiError::InvalidToken)?;
        match state.storage.get_user_by_token(key).await? {
            Some(user) => Ok(Viewer(Some(user))),
            None => {
                debug!("Rejected unknown token");
                Err(ApiError::InvalidToken)
            }
        }
    }
}

/// An authenticated user; anonymous requests get 401.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Viewer::from_request_parts(parts, state).await? {
            Viewer(Some(user)) => Ok(CurrentUser(user)),
            Viewer(None) => Err(ApiError::NotAuthenticated),
        }
    }
}

/// `scheme://host`, the request path and its decoded query string.
pub struct RequestInfo {
    pub origin: String,
    pub path: String,
    pub query: QueryParams,
}

impl RequestInfo {
    /// Absolute URL without the query string.
    pub fn url(&self) -> String {
        format!("{}{}", self.origin, self.path)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestInfo {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost")
            .to_string();
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("http");
        Ok(Self {
            origin: format!("{scheme}://{host}"),
            path: parts.uri.path().to_string(),
            query: QueryParams::parse(parts.uri.query()),
        })
    }
}
