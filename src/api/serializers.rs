//! Request payloads and response representations.

use super::error::ApiResult;
use super::state::AppState;
use crate::domain::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Requests

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: Option<String>,
    pub current_password: Option<String>,
}

/// Integer fields stay raw JSON so that `"20"` is accepted and a bad value
/// becomes an error on that field instead of rejecting the whole body.
#[derive(Debug, Deserialize)]
pub struct IngredientAmountRequest {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Deserialize)]
pub struct RecipeRequest {
    pub ingredients: Option<Vec<IngredientAmountRequest>>,
    pub tags: Option<Vec<Value>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<Value>,
}

// Responses

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserCreatedResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub email: String,
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

#[derive(Debug, Serialize)]
pub struct RecipeIngredientResponse {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: RecipeId,
    pub tags: Vec<Tag>,
    pub author: UserResponse,
    pub ingredients: Vec<RecipeIngredientResponse>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
}

#[derive(Debug, Serialize)]
pub struct RecipeShortResponse {
    pub id: RecipeId,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeShortResponse>,
    pub recipes_count: usize,
}

impl From<User> for UserCreatedResponse {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// Renders domain objects from the point of view of one request.
pub struct Renderer<'a> {
    pub state: &'a AppState,
    pub viewer: Option<&'a User>,
    pub origin: &'a str,
}

impl<'a> Renderer<'a> {
    pub fn new(state: &'a AppState, viewer: Option<&'a User>, origin: &'a str) -> Self {
        Self { state, viewer, origin }
    }

    pub fn image_url(&self, relative: &str) -> String {
        self.state.media.absolute_url(self.origin, relative)
    }

    pub async fn user(&self, user: User) -> ApiResult<UserResponse> {
        let is_subscribed = match self.viewer {
            Some(viewer) if viewer.id != user.id => {
                self.state.storage.is_subscribed(viewer.id, user.id).await?
            }
            _ => false,
        };
        Ok(UserResponse {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        })
    }

    pub async fn users(&self, users: Vec<User>) -> ApiResult<Vec<UserResponse>> {
        let mut rendered = Vec::with_capacity(users.len());
        for user in users {
            rendered.push(self.user(user).await?);
        }
        Ok(rendered)
    }

    pub async fn recipe(&self, recipe: Recipe) -> ApiResult<RecipeResponse> {
        let (is_favorited, is_in_shopping_cart) = match self.viewer {
            Some(viewer) => {
                let storage = &self.state.storage;
                (
                    storage.in_list(RecipeList::Favorites, viewer.id, recipe.id).await?,
                    storage.in_list(RecipeList::ShoppingCart, viewer.id, recipe.id).await?,
                )
            }
            None => (false, false),
        };
        let image = self.image_url(&recipe.image);
        Ok(RecipeResponse {
            id: recipe.id,
            tags: recipe.tags,
            author: self.user(recipe.author).await?,
            ingredients: recipe
                .ingredients
                .into_iter()
                .map(|item| RecipeIngredientResponse {
                    id: item.ingredient.id,
                    name: item.ingredient.name,
                    measurement_unit: item.ingredient.measurement_unit,
                    amount: item.amount,
                })
                .collect(),
            is_favorited,
            is_in_shopping_cart,
            name: recipe.name,
            image,
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        })
    }

    pub async fn recipes(&self, recipes: Vec<Recipe>) -> ApiResult<Vec<RecipeResponse>> {
        let mut rendered = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            rendered.push(self.recipe(recipe).await?);
        }
        Ok(rendered)
    }

    pub fn short(&self, recipe: &Recipe) -> RecipeShortResponse {
        RecipeShortResponse {
            id: recipe.id,
            name: recipe.name.clone(),
            image: self.image_url(&recipe.image),
            cooking_time: recipe.cooking_time,
        }
    }

    /// Author card with a preview of their newest recipes.
    pub async fn subscription(&self, author: User, recipes_limit: Option<usize>) -> ApiResult<SubscriptionResponse> {
        let storage = &self.state.storage;
        let recipes = storage.recipes_by_author(author.id, recipes_limit).await?;
        let recipes_count = storage.count_recipes_by_author(author.id).await?;
        Ok(SubscriptionResponse {
            recipes: recipes.iter().map(|r| self.short(r)).collect(),
            recipes_count,
            user: self.user(author).await?,
        })
    }
}
