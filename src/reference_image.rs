use crate::error::{GenerationError, Result};
use crate::logi;
use image::ImageFormat;
use image::imageops::FilterType;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const TARGET_WIDTH: u32 = 1920;
pub const TARGET_HEIGHT: u32 = 1080;
pub const REFERENCE_MIME: &str = "image/jpeg";

/// Loads a reference image and force-resizes it to 1920x1080 JPEG.
///
/// The aspect ratio is not preserved, so the model never sees pillar or letter boxes.
pub async fn preprocess_reference_image(path: &Path) -> Result<Vec<u8>> {
    if tokio::fs::metadata(path).await.is_err() {
        return Err(GenerationError::FileNotFound(path.to_path_buf()));
    }

    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    logi(format!("      - Resizing '{}' to {}x{}...", name, TARGET_WIDTH, TARGET_HEIGHT));

    let owned: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || resize_to_jpeg(&owned))
        .await
        .map_err(|e| GenerationError::InvalidImage {
            path: path.to_path_buf(),
            message: format!("resize task failed: {e}"),
        })?
}

fn resize_to_jpeg(path: &Path) -> Result<Vec<u8>> {
    let invalid = |message: String| GenerationError::InvalidImage {
        path: path.to_path_buf(),
        message,
    };

    let img = image::open(path).map_err(|e| invalid(e.to_string()))?;
    let resized = img.resize_exact(TARGET_WIDTH, TARGET_HEIGHT, FilterType::Lanczos3);
    // JPEG has no alpha channel
    let rgb = image::DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| invalid(e.to_string()))?;
    Ok(out.into_inner())
}
