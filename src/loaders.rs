//! Bulk loading of reference data (ingredients, tags) from JSON files.

use crate::constants::*;
use crate::domain::{NewIngredient, NewTag};
use crate::error::{FoodgramError, Result};
use crate::storage::Storage;
use crate::validation::{max_length, required_text, validate_color, validate_slug};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::info;

fn check_filename(path: &Path) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(FoodgramError::Config(
            "Unknown file format. Only .json is supported.".to_string(),
        ));
    }
    Ok(())
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    check_filename(path)?;
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn invalid(index: usize, field: &str, message: String) -> FoodgramError {
    FoodgramError::Config(format!("record {index}: {field}: {message}"))
}

pub async fn load_ingredients(storage: &dyn Storage, path: &Path) -> Result<usize> {
    let records: Vec<NewIngredient> = read_records(path)?;
    let mut ingredients = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let name = required_text(Some(&record.name), MAX_INGREDIENT_NAME)
            .map_err(|e| invalid(index, "name", e))?;
        let measurement_unit = required_text(Some(&record.measurement_unit), MAX_INGREDIENT_MEASURE)
            .map_err(|e| invalid(index, "measurement_unit", e))?;
        ingredients.push(NewIngredient { name, measurement_unit });
    }
    let loaded = storage.create_ingredients(&ingredients).await?;
    info!("Successfully loaded {} ingredients from {}", loaded, path.display());
    Ok(loaded)
}

pub async fn load_tags(storage: &dyn Storage, path: &Path) -> Result<usize> {
    let records: Vec<NewTag> = read_records(path)?;
    for (index, tag) in records.iter().enumerate() {
        required_text(Some(&tag.name), MAX_TAG_NAME).map_err(|e| invalid(index, "name", e))?;
        max_length(&tag.color, MAX_TAG_COLOR)
            .and_then(|_| validate_color(&tag.color))
            .map_err(|e| invalid(index, "color", e))?;
        validate_slug(&tag.slug).map_err(|e| invalid(index, "slug", e))?;
    }
    let loaded = storage.create_tags(&records).await?;
    info!("Successfully loaded {} tags from {}", loaded, path.display());
    Ok(loaded)
}
