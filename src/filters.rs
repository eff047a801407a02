use crate::domain::{Ingredient, RecipeFilter, UserId};
use crate::query::QueryParams;
use crate::validation::FieldErrors;

pub fn invalid_choice(value: &str) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

/// `1/true` and `0/false`, case-insensitive; anything else means "not set".
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Builds the recipe list filter. Existence of the author and tag slugs is
/// checked by the caller against storage.
pub fn recipe_filter(params: &QueryParams, viewer: Option<UserId>) -> Result<RecipeFilter, FieldErrors> {
    let mut errors = FieldErrors::new();

    let author = match params.get("author").map(str::trim).filter(|a| !a.is_empty()) {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add("author", invalid_choice(raw));
                None
            }
        },
        None => None,
    };

    let mut tags: Vec<String> = Vec::new();
    for slug in params.get_all("tags") {
        let slug = slug.trim();
        if !slug.is_empty() && !tags.iter().any(|t| t == slug) {
            tags.push(slug.to_string());
        }
    }

    errors.into_result()?;
    Ok(RecipeFilter {
        author,
        tags,
        is_favorited: params.get("is_favorited").and_then(parse_bool),
        is_in_shopping_cart: params.get("is_in_shopping_cart").and_then(parse_bool),
        viewer,
    })
}

/// Ingredient search: `name` is a case-insensitive prefix, `search` a
/// case-insensitive substring. Both apply when both are given.
pub fn filter_ingredients(ingredients: Vec<Ingredient>, params: &QueryParams) -> Vec<Ingredient> {
    let prefix = params.get("name").map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    let search = params.get("search").map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
    if prefix.is_none() && search.is_none() {
        return ingredients;
    }
    ingredients
        .into_iter()
        .filter(|ingredient| {
            let name = ingredient.name.to_lowercase();
            prefix.as_deref().map_or(true, |p| name.starts_with(p))
                && search.as_deref().map_or(true, |s| name.contains(s))
        })
        .collect()
}
