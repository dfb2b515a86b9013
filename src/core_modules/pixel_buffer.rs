// THEORY:
// The `PixelBuffer` is the most fundamental unit of the engine. It is a "dumb"
// data container: a width, a height and a flat, row-major array of interleaved
// RGBA8 samples. Every image the engine owns (current, background, difference
// and threshold) is a `PixelBuffer`, and every stage reads and writes them in
// place.
//
// Key architectural principles:
// 1.  **Ownership**: The engine owns all of its buffers. Callers only ever get
//     a shared view, so nothing can alias a buffer across update cycles.
// 2.  **Borrowed Input**: Incoming frames are *not* copied into a buffer. A
//     `Frame` is a validated, borrowed view over the caller's bytes, so the
//     capture layer keeps ownership of its memory.
// 3.  **Flat Layout**: Samples are stored exactly as a capture device or the
//     `image` crate hands them over. Pixel (x, y) starts at byte
//     `(y * width + x) * 4`.

use crate::error::{VisionError, VisionResult};
use image::RgbaImage;

pub const CHANNELS: usize = 4;

pub type Rgba = [u8; CHANNELS];

/// A borrowed, validated RGBA8 frame supplied by the capture layer.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wraps `data` as a `width` x `height` RGBA8 frame.
    ///
    /// Fails when either dimension is zero or `data` holds fewer than
    /// `width * height * 4` bytes. Extra trailing bytes are ignored.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> VisionResult<Self> {
        if width == 0 || height == 0 {
            return Err(VisionError::invalid_frame(
                width,
                height,
                "dimensions must be positive",
            ));
        }
        let expected = byte_len(width, height);
        if data.len() < expected {
            return Err(VisionError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: &data[..expected],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        let i = pixel_offset(self.width, x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

impl<'a> From<&'a RgbaImage> for Frame<'a> {
    fn from(image: &'a RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().as_slice(),
        }
    }
}

/// An owned RGBA8 raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    /// The width of the buffer in pixels.
    width: u32,
    /// The height of the buffer in pixels.
    height: u32,
    /// Row-major RGBA samples, `width * height * 4` bytes.
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a zero-filled (transparent black) buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn same_size_as(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Reallocates to the new dimensions and zero-fills. Prior content is discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(byte_len(width, height), 0);
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        let i = pixel_offset(self.width, x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set(&mut self, x: u32, y: u32, rgba: Rgba) {
        let i = pixel_offset(self.width, x, y);
        self.data[i..i + CHANNELS].copy_from_slice(&rgba);
    }

    /// First sample of the pixel. For the threshold image this is the lit flag.
    #[inline]
    pub fn red_at(&self, x: u32, y: u32) -> u8 {
        self.data[pixel_offset(self.width, x, y)]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Iterates over RGBA quads in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(CHANNELS)
    }

    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.data.chunks_exact_mut(CHANNELS)
    }

    pub fn fill(&mut self, rgba: Rgba) {
        for pixel in self.pixels_mut() {
            pixel.copy_from_slice(&rgba);
        }
    }

    /// Copies the buffer into an `image` crate image for export.
    pub fn to_rgba_image(&self) -> RgbaImage {
        // The length always matches the dimensions, so this never falls back.
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}

#[inline]
fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[inline]
fn pixel_offset(width: u32, x: u32, y: u32) -> usize {
    (y as usize * width as usize + x as usize) * CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_zero_dimensions() {
        let data = vec![0u8; 16];
        assert!(matches!(
            Frame::new(0, 4, &data),
            Err(VisionError::InvalidFrame { .. })
        ));
        assert!(matches!(
            Frame::new(4, 0, &data),
            Err(VisionError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn frame_rejects_short_data() {
        let data = vec![0u8; 15];
        assert!(matches!(
            Frame::new(2, 2, &data),
            Err(VisionError::BufferSizeMismatch {
                expected: 16,
                actual: 15
            })
        ));
    }

    #[test]
    fn frame_from_rgba_image_shares_layout() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([1, 2, 3, 4]));
        let frame = Frame::from(&img);
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.get(2, 1), [1, 2, 3, 4]);
    }

    #[test]
    fn get_set_round_trip_at_corners() {
        let mut buf = PixelBuffer::new(5, 3);
        buf.set(0, 0, [9, 8, 7, 6]);
        buf.set(4, 2, [1, 2, 3, 4]);
        assert_eq!(buf.get(0, 0), [9, 8, 7, 6]);
        assert_eq!(buf.get(4, 2), [1, 2, 3, 4]);
        assert_eq!(buf.red_at(4, 2), 1);
        assert_eq!(buf.get(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn resize_zero_fills() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.fill([255, 255, 255, 255]);
        buf.resize(3, 1);
        assert_eq!(buf.dimensions(), (3, 1));
        assert_eq!(buf.as_bytes().len(), 12);
        assert!(buf.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn pixels_iterates_row_major() {
        let mut buf = PixelBuffer::new(2, 2);
        buf.set(1, 0, [5, 0, 0, 0]);
        let reds: Vec<u8> = buf.pixels().map(|p| p[0]).collect();
        assert_eq!(reds, vec![0, 5, 0, 0]);
    }
}
