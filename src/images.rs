//! Base64 image payloads and the media directory they are stored in.

use crate::constants::RECIPE_IMAGES_DIR;
use crate::error::{FoodgramError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }

    /// Detects the format from the leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<type>;base64,<payload>`.
///
/// The declared type is not trusted; the stored format comes from the bytes.
pub fn decode_data_url(value: &str) -> Result<DecodedImage> {
    let rest = value
        .trim()
        .strip_prefix("data:image/")
        .ok_or_else(|| FoodgramError::Image("expected a data:image/ URL".to_string()))?;
    let (_, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| FoodgramError::Image("expected base64 encoding".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| FoodgramError::Image(format!("base64 decode failed: {e}")))?;
    let format = ImageFormat::sniff(&bytes)
        .ok_or_else(|| FoodgramError::Image("unsupported or corrupt image data".to_string()))?;
    Ok(DecodedImage { format, bytes })
}

/// Media files on disk plus the public URL prefix they are served under.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url
    }

    /// Writes a recipe image and returns its path relative to the media root.
    pub async fn save_recipe_image(&self, image: &DecodedImage) -> Result<String> {
        let dir = self.root.join(RECIPE_IMAGES_DIR);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4().simple(), image.format.extension());
        tokio::fs::write(dir.join(&file_name), &image.bytes).await?;
        let relative = format!("{RECIPE_IMAGES_DIR}/{file_name}");
        debug!("Stored recipe image {} ({} bytes)", relative, image.bytes.len());
        Ok(relative)
    }

    /// Best effort removal of a replaced image.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative.contains("..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            debug!("Could not remove media file {}: {}", relative, e);
        }
    }

    /// Absolute URL for a stored file, given `scheme://host`.
    pub fn absolute_url(&self, origin: &str, relative: &str) -> String {
        format!("{}{}{}", origin.trim_end_matches('/'), self.url, relative)
    }
}
