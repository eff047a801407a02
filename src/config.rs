use crate::constants;
use crate::error::{FoodgramError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "foodgram.toml";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub root: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: constants::DEFAULT_PORT,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_DATABASE),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(constants::DEFAULT_MEDIA_ROOT),
            url: constants::DEFAULT_MEDIA_URL.to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            page_size: constants::DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Loads the TOML file at `path` (or the default location when it exists),
    /// then applies `FOODGRAM_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FoodgramError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: Config = toml::from_str(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Reports where the settings came from. Called once logging is up.
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => info!("Loaded configuration from {}", path.display()),
            None => info!("No {} found, using defaults", DEFAULT_CONFIG_PATH),
        }
        info!(
            "Database {}, media under {}, binding {}",
            self.database.path.display(),
            self.media.root.display(),
            self.bind_addr()
        );
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("FOODGRAM_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var::<u16>("FOODGRAM_PORT")? {
            self.server.port = port;
        }
        if let Ok(path) = env::var("FOODGRAM_DATABASE") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(root) = env::var("FOODGRAM_MEDIA_ROOT") {
            self.media.root = PathBuf::from(root);
        }
        if let Some(page_size) = parse_var::<usize>("FOODGRAM_PAGE_SIZE")? {
            self.api.page_size = page_size;
        }
        if let Ok(dir) = env::var("FOODGRAM_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api.page_size == 0 {
            return Err(FoodgramError::Config(
                "api.page_size must be positive".to_string(),
            ));
        }
        let url = &self.media.url;
        if url.len() < 3 || !url.starts_with('/') || !url.ends_with('/') {
            return Err(FoodgramError::Config(format!(
                "media.url must be a path like /media/: {}",
                url
            )));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| FoodgramError::Config(format!("Invalid {key} value '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}
