//! Read-only tag and ingredient endpoints. Neither is paginated.

use super::error::{ApiError, ApiResult};
use super::extract::RequestInfo;
use super::parse_id;
use super::state::AppState;
use crate::domain::{Ingredient, Tag};
use crate::filters::filter_ingredients;
use axum::extract::{Path, State};
use axum::Json;

pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Json<Vec<Tag>>> {
    Ok(Json(state.storage.list_tags().await?))
}

pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Tag>> {
    let tag = state.storage.get_tag(parse_id(&id)?).await?;
    tag.map(Json).ok_or(ApiError::NotFound)
}

pub async fn list_ingredients(
    State(state): State<AppState>,
    request: RequestInfo,
) -> ApiResult<Json<Vec<Ingredient>>> {
    let ingredients = state.storage.list_ingredients().await?;
    Ok(Json(filter_ingredients(ingredients, &request.query)))
}

pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Ingredient>> {
    let ingredient = state.storage.get_ingredient(parse_id(&id)?).await?;
    ingredient.map(Json).ok_or(ApiError::NotFound)
}
