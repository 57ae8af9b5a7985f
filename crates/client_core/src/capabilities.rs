//! Side-effect capabilities the controller depends on: reading a selected file into a
//! preview and saving a result image.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use shared::domain::{PreviewDataUri, ResultImage, SelectedFile};
use tracing::info;

#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_as_data_uri(&self, file: &SelectedFile) -> Result<PreviewDataUri>;
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Persists `image` under `file_name`, returning where it ended up.
    async fn save(&self, file_name: &str, image: &ResultImage) -> Result<PathBuf>;
}

/// Encodes the selected bytes as a data URI off the async workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64FileReader;

#[async_trait]
impl FileReader for Base64FileReader {
    async fn read_as_data_uri(&self, file: &SelectedFile) -> Result<PreviewDataUri> {
        let file = file.clone();
        tokio::task::spawn_blocking(move || PreviewDataUri::encode(&file.mime_type, file.bytes()))
            .await
            .context("preview encoding task failed")
    }
}

/// Writes decoded result images into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    dir: PathBuf,
}

impl DirectoryDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Downloader for DirectoryDownloader {
    async fn save(&self, file_name: &str, image: &ResultImage) -> Result<PathBuf> {
        let bytes = image
            .decode()
            .map_err(|e| anyhow!("invalid image payload from server: {e}"))?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create '{}'", self.dir.display()))?;

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        info!(path = %path.display(), size_bytes = bytes.len(), "saved personalized image");
        Ok(path)
    }
}

/// Loads a photo from disk, accepting only files whose extension maps to `image/*`.
pub async fn load_photo(path: &Path) -> Result<SelectedFile> {
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    if !mime_type.starts_with("image/") {
        bail!(
            "'{}' is not an image (detected type {mime_type})",
            path.display()
        );
    }

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("photo")
        .to_string();
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    Ok(SelectedFile::new(file_name, mime_type, bytes))
}
