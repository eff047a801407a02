use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;

pub mod sqlite;

pub use sqlite::SqliteStorage;

/// Outcome of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    Created,
    AlreadyExists,
    /// A row the insert refers to does not exist (anymore).
    Missing,
}

/// Storage trait for persisting users, recipes and their relations
#[async_trait]
pub trait Storage: Send + Sync {
    // User operations
    async fn create_user(&self, user: &NewUser) -> Result<User>;
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn get_password_hash(&self, id: UserId) -> Result<Option<String>>;
    async fn set_password_hash(&self, id: UserId, password_hash: &str) -> Result<()>;
    async fn list_users(&self, window: Window) -> Result<Paged<User>>;

    // Token operations
    /// Returns the user's existing token, creating one if needed.
    async fn get_or_create_token(&self, user_id: UserId) -> Result<String>;
    async fn get_user_by_token(&self, key: &str) -> Result<Option<User>>;
    async fn delete_token(&self, user_id: UserId) -> Result<()>;

    // Subscription operations
    async fn subscribe(&self, user_id: UserId, author_id: UserId) -> Result<Inserted>;
    /// Returns false when no subscription existed.
    async fn unsubscribe(&self, user_id: UserId, author_id: UserId) -> Result<bool>;
    async fn is_subscribed(&self, user_id: UserId, author_id: UserId) -> Result<bool>;
    async fn list_subscriptions(&self, user_id: UserId, window: Window) -> Result<Paged<User>>;

    // Tag operations
    async fn list_tags(&self) -> Result<Vec<Tag>>;
    async fn get_tag(&self, id: TagId) -> Result<Option<Tag>>;
    /// Ids from `ids` that do not exist.
    async fn missing_tags(&self, ids: &[TagId]) -> Result<Vec<TagId>>;
    /// Slugs from `slugs` that do not exist.
    async fn missing_tag_slugs(&self, slugs: &[String]) -> Result<Vec<String>>;
    async fn create_tags(&self, tags: &[NewTag]) -> Result<usize>;

    // Ingredient operations
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>>;
    async fn get_ingredient(&self, id: IngredientId) -> Result<Option<Ingredient>>;
    async fn get_ingredients(&self, ids: &[IngredientId]) -> Result<Vec<Ingredient>>;
    async fn create_ingredients(&self, ingredients: &[NewIngredient]) -> Result<usize>;

    // Recipe operations
    async fn create_recipe(&self, author_id: UserId, draft: &RecipeDraft) -> Result<RecipeId>;
    /// Replaces fields, tags and ingredients. Returns the previous image
    /// path when the draft carries a new one.
    async fn update_recipe(&self, id: RecipeId, draft: &RecipeDraft) -> Result<Option<String>>;
    async fn delete_recipe(&self, id: RecipeId) -> Result<bool>;
    async fn get_recipe(&self, id: RecipeId) -> Result<Option<Recipe>>;
    async fn list_recipes(&self, filter: &RecipeFilter, window: Window) -> Result<Paged<Recipe>>;
    /// Newest first, at most `limit` when given.
    async fn recipes_by_author(&self, author_id: UserId, limit: Option<usize>) -> Result<Vec<Recipe>>;
    async fn count_recipes_by_author(&self, author_id: UserId) -> Result<usize>;

    // Favorites and shopping cart
    async fn add_to_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<Inserted>;
    async fn remove_from_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<bool>;
    async fn in_list(&self, list: RecipeList, user_id: UserId, recipe_id: RecipeId) -> Result<bool>;
    async fn shopping_cart_recipes(&self, user_id: UserId) -> Result<Vec<Recipe>>;
    /// Ingredient amounts summed over every recipe in the user's cart.
    async fn shopping_cart_totals(&self, user_id: UserId) -> Result<Vec<IngredientTotal>>;

    // Reporting
    /// `(id, name, cooking_time)` for every recipe.
    async fn cooking_times(&self) -> Result<Vec<(RecipeId, String, i64)>>;
    /// Users matching the subscription filter, ordered by username.
    async fn users_by_subscriptions(&self, filter: SubscriptionFilter) -> Result<Vec<User>>;
    /// Favorite counts for every recipe, most favorited first.
    async fn favorite_counts(&self) -> Result<Vec<FavoriteCount>>;
}
