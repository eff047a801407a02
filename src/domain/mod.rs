use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RecipeId = i64;
pub type TagId = i64;
pub type IngredientId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// A validated registration, with the password already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeIngredient {
    pub ingredient: Ingredient,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct Recipe {
    pub id: RecipeId,
    pub author: User,
    pub name: String,
    /// Path relative to the media root.
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub pub_date: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
}

/// Validated recipe contents for create and update.
#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    /// `None` on update keeps the stored image.
    pub image: Option<String>,
    pub tags: Vec<TagId>,
    pub ingredients: Vec<(IngredientId, i64)>,
}

/// Per-user recipe collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    pub fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }
}

/// Recipe list filters. `viewer` is required for the list-membership filters
/// to take effect.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<UserId>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
    pub viewer: Option<UserId>,
}

/// Admin filter over users by their subscription links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Users following at least one author.
    HasSubscriptions,
    /// Authors followed by at least one user.
    HasSubscribers,
}

/// How many users favorited a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteCount {
    pub recipe_id: RecipeId,
    pub name: String,
    pub author: String,
    pub favorited: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientTotal {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// One page of rows plus the total row count.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    pub count: usize,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}
