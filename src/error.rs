use thiserror::Error;

#[derive(Error, Debug)]
pub enum FoodgramError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid image: {0}")]
    Image(String),

    #[error("Storage lock poisoned")]
    Lock,
}

pub type Result<T> = std::result::Result<T, FoodgramError>;
