use super::error::ApiResult;
use super::extract::CurrentUser;
use super::serializers::{LoginRequest, TokenResponse};
use super::state::AppState;
use crate::auth::verify_password;
use crate::constants::*;
use crate::metrics::{increment, MetricName};
use crate::validation::FieldErrors;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{info, warn};

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(payload) = payload?;
    let mut errors = FieldErrors::new();
    let email = payload.email.as_deref().map(str::trim).unwrap_or_default();
    let password = payload.password.as_deref().unwrap_or_default();
    for (field, value, given) in [
        ("email", email, payload.email.is_some()),
        ("password", password, payload.password.is_some()),
    ] {
        if !given {
            errors.add(field, FIELD_REQUIRED);
        } else if value.is_empty() {
            errors.add(field, FIELD_BLANK);
        }
    }
    errors.into_result()?;

    let user = match state.storage.get_user_by_email(email).await? {
        Some(user) => user,
        None => {
            increment(MetricName::LoginsFailed);
            warn!("Login attempt for unknown email");
            return Err(FieldErrors::single("non_field_errors", INVALID_CREDENTIALS).into());
        }
    };
    let stored = state.storage.get_password_hash(user.id).await?.unwrap_or_default();
    if !verify_password(password, &stored) {
        increment(MetricName::LoginsFailed);
        warn!("Wrong password for user {}", user.id);
        return Err(FieldErrors::single("non_field_errors", INVALID_CREDENTIALS).into());
    }

    let auth_token = state.storage.get_or_create_token(user.id).await?;
    increment(MetricName::LoginsSuccess);
    info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { auth_token }))
}

pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<StatusCode> {
    state.storage.delete_token(user.id).await?;
    info!("User {} logged out", user.id);
    Ok(StatusCode::NO_CONTENT)
}
