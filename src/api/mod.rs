//! JSON API under `/api/`.

pub mod catalog;
pub mod error;
pub mod extract;
pub mod recipes;
pub mod serializers;
pub mod state;
pub mod token;
pub mod users;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

/// Base64 images travel inside the JSON body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Path ids that are not integers cannot match any object.
pub(crate) fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>().map_err(|_| ApiError::NotFound)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/token/login/", post(token::login))
        .route("/api/auth/token/logout/", post(token::logout))
        .route("/api/users/", get(users::list).post(users::create))
        .route("/api/users/me/", get(users::me))
        .route("/api/users/set_password/", post(users::set_password))
        .route("/api/users/subscriptions/", get(users::subscriptions))
        .route("/api/users/:id/", get(users::retrieve))
        .route(
            "/api/users/:id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route("/api/tags/", get(catalog::list_tags))
        .route("/api/tags/:id/", get(catalog::get_tag))
        .route("/api/ingredients/", get(catalog::list_ingredients))
        .route("/api/ingredients/:id/", get(catalog::get_ingredient))
        .route("/api/recipes/", get(recipes::list).post(recipes::create))
        .route(
            "/api/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:id/",
            get(recipes::retrieve)
                .patch(recipes::update)
                .delete(recipes::destroy),
        )
        .route(
            "/api/recipes/:id/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
