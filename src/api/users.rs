use super::error::{ApiError, ApiResult};
use super::extract::{CurrentUser, RequestInfo, Viewer};
use super::serializers::*;
use super::parse_id;
use super::state::AppState;
use crate::auth::{hash_password, verify_password};
use crate::constants::*;
use crate::domain::NewUser;
use crate::metrics::{increment, MetricName};
use crate::pagination::{Page, PageRequest};
use crate::query::QueryParams;
use crate::storage::Inserted;
use crate::validation::*;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

const RECIPES_LIMIT_PARAM: &str = "recipes_limit";

/// An unparsable `recipes_limit` means no limit.
fn recipes_limit(params: &QueryParams) -> Option<usize> {
    params
        .get(RECIPES_LIMIT_PARAM)
        .and_then(|raw| raw.trim().parse::<usize>().ok())
}

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    request: RequestInfo,
) -> ApiResult<Json<Page<UserResponse>>> {
    let page_request = PageRequest::from_query(&request.query, state.page_size)?;
    let paged = state.storage.list_users(page_request.window()).await?;
    let mut page = page_request.paginate(paged, &request.url(), &request.query)?;
    let renderer = Renderer::new(&state, viewer.0.as_ref(), &request.origin);
    let results = renderer.users(std::mem::take(&mut page.results)).await?;
    Ok(Json(page.with_results(results)))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let mut errors = FieldErrors::new();

    let email = match required_text(payload.email.as_deref(), MAX_EMAIL) {
        Ok(email) => {
            errors.check("email", validate_email(&email));
            email
        }
        Err(e) => {
            errors.add("email", e);
            String::new()
        }
    };
    let username = match required_text(payload.username.as_deref(), MAX_USERNAME) {
        Ok(username) => {
            errors.check("username", validate_username(&username));
            username
        }
        Err(e) => {
            errors.add("username", e);
            String::new()
        }
    };
    let first_name = required_text(payload.first_name.as_deref(), MAX_FIRST_NAME)
        .unwrap_or_else(|e| {
            errors.add("first_name", e);
            String::new()
        });
    let last_name = required_text(payload.last_name.as_deref(), MAX_LAST_NAME)
        .unwrap_or_else(|e| {
            errors.add("last_name", e);
            String::new()
        });
    let password = match payload.password.as_deref() {
        Some(password) if !password.is_empty() => {
            errors.check("password", validate_password(password));
            password.to_string()
        }
        Some(_) => {
            errors.add("password", FIELD_BLANK);
            String::new()
        }
        None => {
            errors.add("password", FIELD_REQUIRED);
            String::new()
        }
    };

    if !errors.has("email") && state.storage.get_user_by_email(&email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }
    if !errors.has("username") && state.storage.get_user_by_username(&username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    let user = state
        .storage
        .create_user(&NewUser {
            email,
            username,
            first_name,
            last_name,
            password_hash: hash_password(&password),
        })
        .await?;
    increment(MetricName::UsersRegistered);
    info!("Registered user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(UserCreatedResponse::from(user))))
}

pub async fn retrieve(
    State(state): State<AppState>,
    viewer: Viewer,
    request: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let user = state.storage.get_user(id).await?.ok_or(ApiError::NotFound)?;
    let renderer = Renderer::new(&state, viewer.0.as_ref(), &request.origin);
    Ok(Json(renderer.user(user).await?))
}

pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
) -> ApiResult<Json<UserResponse>> {
    let renderer = Renderer::new(&state, Some(&user), &request.origin);
    Ok(Json(renderer.user(user.clone()).await?))
}

pub async fn set_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(payload) = payload?;
    let mut errors = FieldErrors::new();

    match payload.new_password.as_deref() {
        Some(password) if !password.is_empty() => {
            errors.check("new_password", validate_password(password))
        }
        Some(_) => errors.add("new_password", FIELD_BLANK),
        None => errors.add("new_password", FIELD_REQUIRED),
    }
    match payload.current_password.as_deref() {
        Some(current) if !current.is_empty() => {
            let stored = state.storage.get_password_hash(user.id).await?.unwrap_or_default();
            if !verify_password(current, &stored) {
                errors.add("current_password", INVALID_PASSWORD);
            }
        }
        Some(_) => errors.add("current_password", FIELD_BLANK),
        None => errors.add("current_password", FIELD_REQUIRED),
    }
    errors.into_result()?;

    if let Some(password) = payload.new_password.as_deref() {
        state.storage.set_password_hash(user.id, &hash_password(password)).await?;
    }
    info!("User {} changed their password", user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
) -> ApiResult<Json<Page<SubscriptionResponse>>> {
    let page_request = PageRequest::from_query(&request.query, state.page_size)?;
    let paged = state.storage.list_subscriptions(user.id, page_request.window()).await?;
    let mut page = page_request.paginate(paged, &request.url(), &request.query)?;
    let limit = recipes_limit(&request.query);
    let renderer = Renderer::new(&state, Some(&user), &request.origin);
    let mut results = Vec::with_capacity(page.results.len());
    for author in std::mem::take(&mut page.results) {
        results.push(renderer.subscription(author, limit).await?);
    }
    Ok(Json(page.with_results(results)))
}

pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let author = state.storage.get_user(id).await?.ok_or(ApiError::NotFound)?;
    if author.id == user.id {
        return Err(ApiError::BadRequest(SELF_SUBSCRIPTION.to_string()));
    }
    match state.storage.subscribe(user.id, author.id).await? {
        Inserted::Created => {}
        Inserted::AlreadyExists => {
            return Err(ApiError::BadRequest(message(ALREADY_SUBSCRIBED, &author.username)));
        }
        Inserted::Missing => return Err(ApiError::NotFound),
    }
    increment(MetricName::SubscriptionsCreated);
    info!("User {} subscribed to {}", user.id, author.id);
    let renderer = Renderer::new(&state, Some(&user), &request.origin);
    let body = renderer.subscription(author, recipes_limit(&request.query)).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    let author = state.storage.get_user(id).await?.ok_or(ApiError::NotFound)?;
    if !state.storage.unsubscribe(user.id, author.id).await? {
        return Err(ApiError::BadRequest(message(SUBSCRIPTION_NOT_FOUND, &author.username)));
    }
    info!("User {} unsubscribed from {}", user.id, author.id);
    Ok(StatusCode::NO_CONTENT)
}
