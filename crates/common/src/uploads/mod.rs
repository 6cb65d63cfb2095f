//! Job picture storage
//!
//! Every upload is stored twice: a full-size rendition under `jobs/` and a
//! thumbnail under `jobs_thumbnails/`, both cropped to the best fitting
//! ratio around the centre and resized to fixed dimensions.

use std::io;
use std::path::{Path, PathBuf};

use image::{imageops::FilterType, DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::config::UploadConfig;
use crate::errors::{AppError, Result};
use crate::slug;

const PICTURE_DIR: &str = "jobs";
const THUMBNAIL_DIR: &str = "jobs_thumbnails";

/// Crop to the target ratio around the centre and resize to exactly `width x height`.
pub fn fit(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    image.resize_to_fill(width, height, FilterType::Lanczos3)
}

/// File extension for an accepted picture format
pub fn extension_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::Gif => Some("gif"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// Outcome of storing one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPicture {
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

/// Picture store rooted at the configured upload directory
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
    picture: (u32, u32),
    thumbnail: (u32, u32),
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.root.clone(),
            max_bytes: (config.max_kib * 1024) as usize,
            picture: (config.picture_width, config.picture_height),
            thumbnail: (config.thumbnail_width, config.thumbnail_height),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn picture_path(&self, filename: &str) -> PathBuf {
        self.root.join(PICTURE_DIR).join(filename)
    }

    pub fn thumbnail_path(&self, filename: &str) -> PathBuf {
        self.root.join(THUMBNAIL_DIR).join(filename)
    }

    /// Create the upload directories if they are missing
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(self.root.join(PICTURE_DIR)).await?;
        tokio::fs::create_dir_all(self.root.join(THUMBNAIL_DIR)).await?;
        Ok(())
    }

    /// Check size and format, returning the extension to store under
    pub fn validate(&self, bytes: &[u8]) -> Result<&'static str> {
        if bytes.len() > self.max_bytes {
            return Err(AppError::InvalidUpload {
                message: format!(
                    "The file may not be greater than {} kilobytes.",
                    self.max_bytes / 1024
                ),
            });
        }

        image::guess_format(bytes)
            .ok()
            .and_then(extension_for)
            .ok_or_else(|| AppError::InvalidUpload {
                message: "The file must be an image.".to_string(),
            })
    }

    /// Validate, resize and write both renditions of a job picture
    pub async fn store_job_picture(
        &self,
        bytes: Vec<u8>,
        original_name: &str,
    ) -> Result<StoredPicture> {
        let ext = self.validate(&bytes)?;
        let filename = slug::upload_name(original_name, ext, slug::now());

        let picture_path = self.picture_path(&filename);
        let thumbnail_path = self.thumbnail_path(&filename);
        let (pw, ph) = self.picture;
        let (tw, th) = self.thumbnail;

        // decoding and resampling are CPU bound
        tokio::task::spawn_blocking(move || -> Result<()> {
            let format = image::guess_format(&bytes)?;
            let source = image::load_from_memory_with_format(&bytes, format)?;
            fit(&source, pw, ph).save_with_format(&picture_path, format)?;
            fit(&source, tw, th).save_with_format(&thumbnail_path, format)?;
            Ok(())
        })
        .await
        .map_err(|e| AppError::Internal {
            message: format!("Image task failed: {}", e),
        })??;

        debug!(filename = %filename, "Stored job picture");

        Ok(StoredPicture {
            filename,
            width: pw,
            height: ph,
        })
    }

    /// Remove a thumbnail; a missing file is not an error
    pub async fn delete_thumbnail(&self, filename: &str) -> Result<()> {
        remove_if_exists(&self.thumbnail_path(filename)).await
    }

    /// Remove a full-size picture; a missing file is not an error
    pub async fn delete_picture(&self, filename: &str) -> Result<()> {
        remove_if_exists(&self.picture_path(filename)).await
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "File already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    fn store(root: &Path) -> UploadStore {
        UploadStore::new(&UploadConfig {
            root: root.to_path_buf(),
            ..UploadConfig::default()
        })
    }

    #[test]
    fn test_fit_exact_dimensions() {
        let wide = DynamicImage::ImageRgb8(RgbImage::new(2000, 500));
        assert_eq!(fit(&wide, 1024, 683).dimensions(), (1024, 683));

        let tall = DynamicImage::ImageRgb8(RgbImage::new(300, 1200));
        assert_eq!(fit(&tall, 585, 347).dimensions(), (585, 347));
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for(ImageFormat::Jpeg), Some("jpg"));
        assert_eq!(extension_for(ImageFormat::Png), Some("png"));
        assert_eq!(extension_for(ImageFormat::Bmp), None);
    }

    #[test]
    fn test_validate_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).validate(b"just some text").unwrap_err();
        assert_eq!(err.to_string(), "The file must be an image.");
    }

    #[test]
    fn test_validate_rejects_large_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(&UploadConfig {
            root: dir.path().to_path_buf(),
            max_kib: 1,
            ..UploadConfig::default()
        });
        let err = store.validate(&vec![0u8; 2048]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The file may not be greater than 1 kilobytes."
        );
    }

    #[tokio::test]
    async fn test_store_writes_both_renditions() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_dirs().await.unwrap();

        let stored = store
            .store_job_picture(png_bytes(1600, 900), "office.png")
            .await
            .unwrap();
        assert!(stored.filename.ends_with(".png"));

        let picture = image::open(store.picture_path(&stored.filename)).unwrap();
        assert_eq!(picture.dimensions(), (1024, 683));
        let thumb = image::open(store.thumbnail_path(&stored.filename)).unwrap();
        assert_eq!(thumb.dimensions(), (585, 347));

        store.delete_thumbnail(&stored.filename).await.unwrap();
        assert!(!store.thumbnail_path(&stored.filename).exists());
        // second delete is a no-op
        store.delete_thumbnail(&stored.filename).await.unwrap();
        store.delete_picture(&stored.filename).await.unwrap();
        assert!(!store.picture_path(&stored.filename).exists());
    }
}
