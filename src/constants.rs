// Field limits
pub const MAX_EMAIL: usize = 254;
pub const MAX_USERNAME: usize = 150;
pub const MAX_FIRST_NAME: usize = 150;
pub const MAX_LAST_NAME: usize = 150;
pub const MIN_PASSWORD: usize = 8;
pub const MAX_PASSWORD: usize = 128;

pub const MAX_TAG_NAME: usize = 32;
pub const MAX_TAG_COLOR: usize = 7;
pub const MAX_TAG_SLUG: usize = 32;

pub const MAX_INGREDIENT_NAME: usize = 128;
pub const MAX_INGREDIENT_MEASURE: usize = 64;

pub const MAX_RECIPE_NAME: usize = 256;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32_000;
pub const MIN_INGREDIENT_AMOUNT: i64 = 1;
pub const MAX_INGREDIENT_AMOUNT: i64 = 32_000;

pub const USERNAME_REGEX: &str = r"^[\w.@+-]+$";
pub const COLOR_REGEX: &str = r"^#([a-fA-F0-9]{6})$";
pub const SLUG_REGEX: &str = r"^[-a-zA-Z0-9_]+$";
pub const RESERVED_USERNAME: &str = "me";

// Defaults
pub const DEFAULT_PAGE_SIZE: usize = 6;
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_DATABASE: &str = "foodgram.db";
pub const DEFAULT_MEDIA_ROOT: &str = "media";
pub const DEFAULT_MEDIA_URL: &str = "/media/";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const RECIPE_IMAGES_DIR: &str = "recipes/images";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

// Messages
pub const FIELD_REQUIRED: &str = "This field is required.";
pub const FIELD_BLANK: &str = "This field may not be blank.";
pub const LIST_EMPTY: &str = "This list may not be empty.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const INVALID_PK_TYPE: &str = "Incorrect type. Expected pk value, received {}.";
pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";
pub const INVALID_PASSWORD: &str = "Invalid password.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const SELF_SUBSCRIPTION: &str = "You cannot subscribe to yourself.";
pub const ALREADY_SUBSCRIBED: &str = "You are already subscribed to {}.";
pub const SUBSCRIPTION_NOT_FOUND: &str = "You are not subscribed to {}.";
pub const RECIPE_NOT_FOUND: &str = "Recipe with id {} does not exist.";
pub const RECIPE_ALREADY_IN_FAVORITE: &str = "Recipe {} is already in favorites.";
pub const RECIPE_ALREADY_IN_SHOPPING: &str = "Recipe {} is already in the shopping cart.";
pub const RECIPE_NOT_IN_FAVORITE: &str = "Recipe {} is not in favorites.";
pub const RECIPE_NOT_IN_SHOPPING: &str = "Recipe {} is not in the shopping cart.";

/// Substitutes `{}` in one of the message templates above.
pub fn message(template: &str, value: impl std::fmt::Display) -> String {
    template.replacen("{}", &value.to_string(), 1)
}
