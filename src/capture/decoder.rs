use std::path::Path;

use image::RgbImage;

use crate::Result;

/// File extensions recognised as frames
pub const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Decode one frame file into packed RGB
pub fn decode_frame(path: &Path) -> Result<RgbImage> {
    let decoded = image::open(path)?;
    Ok(decoded.into_rgb8())
}
