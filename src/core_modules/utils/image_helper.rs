//! PNG export of processed buffers, for debugging and the example runner.

use crate::core_modules::pixel_buffer::PixelBuffer;
use crate::error::VisionResult;
use image::ImageEncoder;
use std::path::Path;

/// Writes `buffer` as an RGBA8 PNG.
pub fn save_buffer(path: impl AsRef<Path>, buffer: &PixelBuffer) -> VisionResult<()> {
    let output = std::io::BufWriter::new(std::fs::File::create(path)?);
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(
        buffer.as_bytes(),
        buffer.width(),
        buffer.height(),
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(())
}
