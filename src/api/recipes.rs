use super::error::{ApiError, ApiResult};
use super::extract::{CurrentUser, RequestInfo, Viewer};
use super::parse_id;
use super::serializers::*;
use super::state::AppState;
use crate::constants::*;
use crate::domain::{Recipe, RecipeDraft, RecipeId, RecipeList, User};
use crate::filters::{invalid_choice, recipe_filter};
use crate::images::{decode_data_url, DecodedImage};
use crate::metrics::{increment, MetricName};
use crate::pagination::{Page, PageRequest};
use crate::shopping_list;
use crate::storage::Inserted;
use crate::validation::*;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::{debug, info, warn};

pub async fn list(
    State(state): State<AppState>,
    viewer: Viewer,
    request: RequestInfo,
) -> ApiResult<Json<Page<RecipeResponse>>> {
    let filter = recipe_filter(&request.query, viewer.id())?;
    let mut errors = FieldErrors::new();
    if let Some(author) = filter.author {
        if state.storage.get_user(author).await?.is_none() {
            errors.add("author", invalid_choice(&author.to_string()));
        }
    }
    for slug in state.storage.missing_tag_slugs(&filter.tags).await? {
        errors.add("tags", invalid_choice(&slug));
    }
    errors.into_result()?;

    let page_request = PageRequest::from_query(&request.query, state.page_size)?;
    let paged = state.storage.list_recipes(&filter, page_request.window()).await?;
    let mut page = page_request.paginate(paged, &request.url(), &request.query)?;
    let renderer = Renderer::new(&state, viewer.0.as_ref(), &request.origin);
    let results = renderer.recipes(std::mem::take(&mut page.results)).await?;
    Ok(Json(page.with_results(results)))
}

pub async fn retrieve(
    State(state): State<AppState>,
    viewer: Viewer,
    request: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<Json<RecipeResponse>> {
    let recipe = find_recipe(&state, &id).await?;
    let renderer = Renderer::new(&state, viewer.0.as_ref(), &request.origin);
    Ok(Json(renderer.recipe(recipe).await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(payload) = payload?;
    let (mut draft, image) = validate_recipe(&state, payload, None).await?;
    let image = image.ok_or_else(|| FieldErrors::single("image", FIELD_REQUIRED))?;
    let stored = state.media.save_recipe_image(&image).await?;
    draft.image = Some(stored.clone());

    let id = match state.storage.create_recipe(user.id, &draft).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&stored).await;
            return Err(e.into());
        }
    };
    increment(MetricName::RecipesCreated);
    info!("User {} created recipe {} ({})", user.id, draft.name, id);

    let recipe = state.storage.get_recipe(id).await?.ok_or(ApiError::NotFound)?;
    let renderer = Renderer::new(&state, Some(&user), &request.origin);
    Ok((StatusCode::CREATED, Json(renderer.recipe(recipe).await?)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
    Path(id): Path<String>,
    payload: Result<Json<RecipeRequest>, JsonRejection>,
) -> ApiResult<Json<RecipeResponse>> {
    let existing = find_recipe(&state, &id).await?;
    ensure_author(&existing, &user)?;
    let Json(payload) = payload?;
    let (mut draft, image) = validate_recipe(&state, payload, Some(&existing)).await?;

    let stored = match image {
        Some(image) => Some(state.media.save_recipe_image(&image).await?),
        None => None,
    };
    draft.image = stored.clone();
    match state.storage.update_recipe(existing.id, &draft).await {
        Ok(Some(previous)) => state.media.remove(&previous).await,
        Ok(None) => {}
        Err(e) => {
            if let Some(stored) = stored {
                state.media.remove(&stored).await;
            }
            return Err(e.into());
        }
    }
    increment(MetricName::RecipesUpdated);
    info!("User {} updated recipe {}", user.id, existing.id);

    let recipe = state.storage.get_recipe(existing.id).await?.ok_or(ApiError::NotFound)?;
    let renderer = Renderer::new(&state, Some(&user), &request.origin);
    Ok(Json(renderer.recipe(recipe).await?))
}

pub async fn destroy(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let recipe = find_recipe(&state, &id).await?;
    ensure_author(&recipe, &user)?;
    if state.storage.delete_recipe(recipe.id).await? {
        state.media.remove(&recipe.image).await;
        increment(MetricName::RecipesDeleted);
        info!("User {} deleted recipe {}", user.id, recipe.id);
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    add_to_list(&state, RecipeList::Favorites, &user, &request, &id).await
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    remove_from_list(&state, RecipeList::Favorites, &user, &id).await
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    request: RequestInfo,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    add_to_list(&state, RecipeList::ShoppingCart, &user, &request, &id).await
}

pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    remove_from_list(&state, RecipeList::ShoppingCart, &user, &id).await
}

/// Plain-text shopping list for every recipe in the user's cart.
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    let recipes = state.storage.shopping_cart_recipes(user.id).await?;
    let products = state.storage.shopping_cart_totals(user.id).await?;
    let names: Vec<String> = recipes.into_iter().map(|r| r.name).collect();
    let body = shopping_list::render(chrono::Local::now().naive_local(), &names, &products);
    increment(MetricName::ShoppingListsDownloaded);
    debug!(
        "User {} downloaded a shopping list with {} products",
        user.id,
        products.len()
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
            ),
        ],
        body,
    ))
}

async fn find_recipe(state: &AppState, raw_id: &str) -> ApiResult<Recipe> {
    let id = parse_id(raw_id)?;
    state.storage.get_recipe(id).await?.ok_or(ApiError::NotFound)
}

fn ensure_author(recipe: &Recipe, user: &User) -> ApiResult<()> {
    if recipe.author.id != user.id {
        warn!("User {} may not modify recipe {}", user.id, recipe.id);
        return Err(ApiError::PermissionDenied);
    }
    Ok(())
}

async fn add_to_list(
    state: &AppState,
    list: RecipeList,
    user: &User,
    request: &RequestInfo,
    raw_id: &str,
) -> ApiResult<(StatusCode, Json<RecipeShortResponse>)> {
    let id: RecipeId = parse_id(raw_id)?;
    let recipe = state
        .storage
        .get_recipe(id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(message(RECIPE_NOT_FOUND, id)))?;
    match state.storage.add_to_list(list, user.id, recipe.id).await? {
        Inserted::Created => {}
        Inserted::AlreadyExists => {
            let template = match list {
                RecipeList::Favorites => RECIPE_ALREADY_IN_FAVORITE,
                RecipeList::ShoppingCart => RECIPE_ALREADY_IN_SHOPPING,
            };
            return Err(ApiError::BadRequest(message(template, &recipe.name)));
        }
        // Deleted after the lookup above
        Inserted::Missing => return Err(ApiError::BadRequest(message(RECIPE_NOT_FOUND, id))),
    }
    increment(match list {
        RecipeList::Favorites => MetricName::FavoritesAdded,
        RecipeList::ShoppingCart => MetricName::ShoppingCartAdded,
    });
    debug!("User {} added recipe {} to {}", user.id, recipe.id, list.table());
    let renderer = Renderer::new(state, Some(user), &request.origin);
    Ok((StatusCode::CREATED, Json(renderer.short(&recipe))))
}

async fn remove_from_list(
    state: &AppState,
    list: RecipeList,
    user: &User,
    raw_id: &str,
) -> ApiResult<StatusCode> {
    let recipe = find_recipe(state, raw_id).await?;
    if !state.storage.remove_from_list(list, user.id, recipe.id).await? {
        let template = match list {
            RecipeList::Favorites => RECIPE_NOT_IN_FAVORITE,
            RecipeList::ShoppingCart => RECIPE_NOT_IN_SHOPPING,
        };
        return Err(ApiError::BadRequest(message(template, &recipe.name)));
    }
    debug!("User {} removed recipe {} from {}", user.id, recipe.id, list.table());
    Ok(StatusCode::NO_CONTENT)
}

/// Checks a create or update payload. On update, missing scalar fields and
/// the image keep their current values while ingredients and tags stay
/// required. The decoded image is returned unsaved.
async fn validate_recipe(
    state: &AppState,
    payload: RecipeRequest,
    existing: Option<&Recipe>,
) -> ApiResult<(RecipeDraft, Option<DecodedImage>)> {
    let mut errors = FieldErrors::new();

    let name = match (payload.name.as_deref(), existing) {
        (None, Some(recipe)) => recipe.name.clone(),
        (name, _) => required_text(name, MAX_RECIPE_NAME).unwrap_or_else(|e| {
            errors.add("name", e);
            String::new()
        }),
    };
    let text = match (payload.text.as_deref(), existing) {
        (None, Some(recipe)) => recipe.text.clone(),
        (text, _) => required_text(text, usize::MAX).unwrap_or_else(|e| {
            errors.add("text", e);
            String::new()
        }),
    };
    let cooking_time = match (payload.cooking_time.as_ref(), existing) {
        (Some(raw), _) => match integer(raw) {
            Ok(minutes) => {
                errors.check("cooking_time", in_range(minutes, MIN_COOKING_TIME, MAX_COOKING_TIME));
                minutes
            }
            Err(e) => {
                errors.add("cooking_time", e);
                0
            }
        },
        (None, Some(recipe)) => recipe.cooking_time,
        (None, None) => {
            errors.add("cooking_time", FIELD_REQUIRED);
            0
        }
    };

    let image = match payload.image.as_deref().map(str::trim) {
        Some("") => {
            errors.add("image", FIELD_BLANK);
            None
        }
        Some(data) => match decode_data_url(data) {
            Ok(image) => Some(image),
            Err(e) => {
                debug!("Rejected recipe image: {}", e);
                errors.add("image", INVALID_IMAGE);
                None
            }
        },
        None if existing.is_none() => {
            errors.add("image", FIELD_REQUIRED);
            None
        }
        None => None,
    };

    let mut ingredients = Vec::new();
    match payload.ingredients {
        None => errors.add("ingredients", FIELD_REQUIRED),
        Some(items) if items.is_empty() => errors.add("ingredients", LIST_EMPTY),
        Some(items) => {
            for (position, item) in items.iter().enumerate() {
                let id = match integer(&item.id) {
                    Ok(id) => id,
                    Err(e) => {
                        errors.add("ingredients", format!("Ingredient #{} id: {}", position + 1, e));
                        continue;
                    }
                };
                match integer(&item.amount) {
                    Ok(amount) => {
                        if let Err(e) = in_range(amount, MIN_INGREDIENT_AMOUNT, MAX_INGREDIENT_AMOUNT) {
                            errors.add("ingredients", format!("Ingredient {id}: {e}"));
                        }
                        ingredients.push((id, amount));
                    }
                    Err(e) => errors.add("ingredients", format!("Ingredient {id} amount: {e}")),
                }
            }
            let ids: Vec<i64> = ingredients.iter().map(|(id, _)| *id).collect();
            for id in duplicates(&ids) {
                errors.add("ingredients", format!("Ingredient {id} is listed more than once."));
            }
            let known = state.storage.get_ingredients(&ids).await?;
            for id in &ids {
                if !known.iter().any(|ingredient| ingredient.id == *id) {
                    errors.add("ingredients", format!("Ingredient with id {id} does not exist."));
                }
            }
        }
    }

    let mut tags = Vec::new();
    match payload.tags {
        None => errors.add("tags", FIELD_REQUIRED),
        Some(raw) if raw.is_empty() => errors.add("tags", LIST_EMPTY),
        Some(raw) => {
            let mut ids = Vec::with_capacity(raw.len());
            for value in &raw {
                match integer(value) {
                    Ok(id) => ids.push(id),
                    Err(_) => errors.add("tags", message(INVALID_PK_TYPE, value)),
                }
            }
            for id in duplicates(&ids) {
                errors.add("tags", format!("Tag {id} is listed more than once."));
            }
            for id in state.storage.missing_tags(&ids).await? {
                errors.add("tags", format!("Invalid pk \"{id}\" - object does not exist."));
            }
            tags = ids;
        }
    }

    errors.into_result()?;
    let draft = RecipeDraft {
        name,
        text,
        cooking_time,
        image: None,
        tags,
        ingredients,
    };
    Ok((draft, image))
}
