//! Upload pipeline: validates extensions, persists originals under the
//! static root, and derives bounded thumbnails.
//!
//! Thumbnail failure is never fatal: the original is kept and the thumbnail
//! path falls back to the shared placeholder. File deletion is best-effort
//! and invoked by the edit/delete flows, not by the pipeline itself.

use anyhow::{Context, Result};
use image::GenericImageView;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Placeholder asset used wherever an image is absent.
pub const DEFAULT_IMAGE: &str = "undo.png";

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];
const THUMB_MAX: u32 = 300;
const THUMB_PREFIX: &str = "thumb_";

#[derive(Debug, Clone)]
pub struct MediaStore {
    static_root: PathBuf,
}

impl MediaStore {
    pub fn new(static_root: PathBuf) -> Self {
        Self { static_root }
    }

    /// Lowercased extension when the filename passes the allow-list.
    fn allowed_extension(filename: &str) -> Option<String> {
        let (_, ext) = filename.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
    }

    /// Persist an uploaded image and derive its thumbnail. Returns paths
    /// relative to the static root. A disallowed extension is treated as
    /// "no file" and yields the placeholder pair.
    ///
    /// Client filenames are never trusted: the stored name is a random
    /// 128-bit identifier plus the original extension.
    pub async fn store(&self, filename: &str, data: &[u8]) -> Result<(String, String)> {
        let Some(ext) = Self::allowed_extension(filename) else {
            debug!(filename, "Upload extension not allowed, using placeholder");
            return Ok((DEFAULT_IMAGE.to_string(), DEFAULT_IMAGE.to_string()));
        };

        let name = format!("{}.{}", Uuid::new_v4().simple(), ext);
        let upload_dir = self.static_root.join("uploads");
        let thumb_dir = upload_dir.join("thumbnail");
        tokio::fs::create_dir_all(&thumb_dir).await?;

        tokio::fs::write(upload_dir.join(&name), data)
            .await
            .with_context(|| format!("Failed to write upload {name}"))?;
        let image_path = format!("uploads/{name}");

        let thumb_name = format!("{THUMB_PREFIX}{name}");
        let thumbnail_path = match make_thumbnail(data, &thumb_dir.join(&thumb_name)) {
            Ok(()) => format!("uploads/thumbnail/{thumb_name}"),
            Err(e) => {
                warn!(error = %e, filename, "Thumbnail generation failed, using placeholder");
                DEFAULT_IMAGE.to_string()
            }
        };

        Ok((image_path, thumbnail_path))
    }

    /// Best-effort removal of a previously stored file. The placeholder is
    /// shared between projects and is never deleted; errors are logged and
    /// swallowed so record-level flows proceed regardless.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative == DEFAULT_IMAGE {
            return;
        }
        let path = self.static_root.join(relative);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(path = %path.display(), "Deleted image file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to delete image file"),
        }
    }
}

/// Decode the upload and write a thumbnail bounded to 300×300. Downscale
/// only; a source already within bounds is written at its own size.
fn make_thumbnail(data: &[u8], dest: &Path) -> Result<()> {
    let img = image::load_from_memory(data)?;
    let (width, height) = img.dimensions();
    let thumb = if width > THUMB_MAX || height > THUMB_MAX {
        img.thumbnail(THUMB_MAX, THUMB_MAX)
    } else {
        img
    };
    thumb.save(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([120, 80, 40, 255]),
        ));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        assert_eq!(MediaStore::allowed_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(MediaStore::allowed_extension("a.b.JPEG").as_deref(), Some("jpeg"));
        assert!(MediaStore::allowed_extension("notes.txt").is_none());
        assert!(MediaStore::allowed_extension("no_extension").is_none());
        assert!(MediaStore::allowed_extension("").is_none());
    }

    #[tokio::test]
    async fn disallowed_extension_yields_placeholder_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());

        let (image, thumb) = store.store("notes.txt", b"hello").await.unwrap();
        assert_eq!(image, DEFAULT_IMAGE);
        assert_eq!(thumb, DEFAULT_IMAGE);
    }

    #[tokio::test]
    async fn valid_upload_produces_bounded_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());

        let (image_path, thumb_path) = store.store("photo.png", &png_bytes(800, 600)).await.unwrap();
        assert_ne!(image_path, thumb_path);
        assert!(image_path.starts_with("uploads/"));
        assert!(thumb_path.starts_with("uploads/thumbnail/thumb_"));
        assert!(dir.path().join(&image_path).exists());

        let thumb = image::open(dir.path().join(&thumb_path)).unwrap();
        // 800x600 bounded to 300x300 keeps the 4:3 ratio
        assert_eq!(thumb.dimensions(), (300, 225));
    }

    #[tokio::test]
    async fn small_images_are_never_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());

        let (_, thumb_path) = store.store("tiny.png", &png_bytes(120, 90)).await.unwrap();
        let thumb = image::open(dir.path().join(&thumb_path)).unwrap();
        assert_eq!(thumb.dimensions(), (120, 90));
    }

    #[tokio::test]
    async fn corrupt_image_keeps_original_and_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());

        let (image_path, thumb_path) =
            store.store("broken.png", b"definitely not a png").await.unwrap();
        assert!(dir.path().join(&image_path).exists());
        assert_eq!(thumb_path, DEFAULT_IMAGE);
    }

    #[tokio::test]
    async fn remove_skips_placeholder_and_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().to_path_buf());

        // Neither call may panic or error out
        store.remove(DEFAULT_IMAGE).await;
        store.remove("uploads/gone.png").await;

        let (image_path, _) = store.store("photo.png", &png_bytes(10, 10)).await.unwrap();
        store.remove(&image_path).await;
        assert!(!dir.path().join(&image_path).exists());
    }
}
