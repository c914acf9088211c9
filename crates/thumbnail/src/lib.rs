//! Companion thumbnail preparation.
//!
//! Renders the configured source image as a small JPEG inside the watched
//! directory. Transparency is flattened onto white first, since JPEG has no
//! alpha channel. Failures here never stop the daemon; the caller proceeds
//! without a thumbnail.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;

/// File name of the generated thumbnail inside the watched directory.
pub const THUMBNAIL_FILE_NAME: &str = "thumb.jpg";

/// Maximum thumbnail edge length in pixels.
pub const MAX_EDGE: u32 = 320;

/// Errors from thumbnail preparation.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("source image not found: {0}")]
    SourceMissing(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Renders `source` as a ≤320×320 JPEG named `thumb.jpg` inside `dest_dir`.
///
/// Preserves aspect ratio and never upscales. Returns the generated path.
pub fn prepare(source: &Path, dest_dir: &Path) -> Result<PathBuf, ThumbnailError> {
    if !source.is_file() {
        return Err(ThumbnailError::SourceMissing(
            source.display().to_string(),
        ));
    }

    let img = image::open(source)?;
    let img = if img.width() > MAX_EDGE || img.height() > MAX_EDGE {
        img.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = flatten_onto_white(img);

    let dest = dest_dir.join(THUMBNAIL_FILE_NAME);
    rgb.save_with_format(&dest, image::ImageFormat::Jpeg)?;
    tracing::info!(path = %dest.display(), "thumbnail created");
    Ok(dest)
}

/// Composites an image onto a white background, discarding alpha.
fn flatten_onto_white(img: DynamicImage) -> image::RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = image::RgbImage::from_pixel(rgba.width(), rgba.height(), image::Rgb([255; 3]));
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, image::Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}

/// Removes a previously generated thumbnail. Safe to call more than once.
pub fn remove(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "thumbnail removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove thumbnail"),
    }
}
