// THEORY:
// The `ImageFilter` is the temporal analysis layer of the engine. It owns the
// four frame buffers and turns each new frame into a binary "lit / unlit" map
// of where the scene differs from its learned background.
//
// Per frame, per RGB channel (alpha is always forced to 255):
// 1.  **Mirror**: the raw frame is copied into `current`, flipped as configured.
// 2.  **Background**: in progressive mode the background is an exponential
//     running average, `bg' = bg * feedback + current * (1 - feedback)`. In
//     static mode it only changes through `set_background`.
// 3.  **Difference**: `|bg - current|`.
// 4.  **Threshold**: a pixel is lit (255) when the selected channel of the
//     difference exceeds `threshold * 255`, otherwise 0. R, G and B of the
//     threshold image carry the same value, so consumers may read any one.
//
// The filter has no notion of zones or blobs; it only guarantees that all
// four buffers always share the dimensions of the last accepted frame.

use crate::config::{ThresholdChannel, VisionConfig};
use crate::core_modules::mirror::mirror_into;
use crate::core_modules::pixel_buffer::{CHANNELS, Frame, PixelBuffer};
use tracing::info;

const OPAQUE: u8 = 255;
pub const LIT: u8 = 255;
pub const UNLIT: u8 = 0;

/// Owns the current, background, difference and threshold images.
#[derive(Debug, Clone)]
pub struct ImageFilter {
    current: PixelBuffer,
    background: PixelBuffer,
    difference: PixelBuffer,
    threshold: PixelBuffer,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageFilter {
    /// Creates a filter with empty buffers. They are sized by the first frame.
    pub fn new() -> Self {
        Self {
            current: PixelBuffer::new(0, 0),
            background: PixelBuffer::new(0, 0),
            difference: PixelBuffer::new(0, 0),
            threshold: PixelBuffer::new(0, 0),
        }
    }

    pub fn width(&self) -> u32 {
        self.current.width()
    }

    pub fn height(&self) -> u32 {
        self.current.height()
    }

    pub fn current(&self) -> &PixelBuffer {
        &self.current
    }

    pub fn background(&self) -> &PixelBuffer {
        &self.background
    }

    pub fn difference(&self) -> &PixelBuffer {
        &self.difference
    }

    pub fn threshold(&self) -> &PixelBuffer {
        &self.threshold
    }

    /// Resizes all four buffers together when the frame size changed.
    /// Returns true when a resize happened.
    pub fn ensure_size(&mut self, width: u32, height: u32) -> bool {
        if self.background.same_size_as(width, height) {
            return false;
        }
        info!(width, height, "adjusting image buffers to new frame size");
        self.current.resize(width, height);
        self.background.resize(width, height);
        self.difference.resize(width, height);
        self.threshold.resize(width, height);
        true
    }

    /// Replaces the background with (a mirrored copy of) `frame`.
    pub fn set_background(&mut self, frame: &Frame<'_>, config: &VisionConfig) {
        self.ensure_size(frame.width(), frame.height());
        mirror_into(frame, config.mirror, &mut self.background);
        for pixel in self.background.pixels_mut() {
            pixel[3] = OPAQUE;
        }
    }

    /// Processes one frame, updating all derived buffers in place.
    pub fn process(&mut self, frame: &Frame<'_>, config: &VisionConfig) {
        self.ensure_size(frame.width(), frame.height());
        mirror_into(frame, config.mirror, &mut self.current);

        let feedback = config.image_filter_feedback.clamp(0.0, 1.0);
        let level = config.image_filter_threshold * 255.0;
        let progressive = config.progressive_background;

        let current = self.current.as_bytes();
        let background = self.background.as_bytes_mut();
        let difference = self.difference.as_bytes_mut();
        let threshold = self.threshold.as_bytes_mut();

        for (((cur, bg), diff), thr) in current
            .chunks_exact(CHANNELS)
            .zip(background.chunks_exact_mut(CHANNELS))
            .zip(difference.chunks_exact_mut(CHANNELS))
            .zip(threshold.chunks_exact_mut(CHANNELS))
        {
            for c in 0..3 {
                if progressive {
                    bg[c] = blend(bg[c], cur[c], feedback);
                }
                diff[c] = bg[c].abs_diff(cur[c]);
            }
            bg[3] = OPAQUE;
            diff[3] = OPAQUE;

            let value = if channel_value(diff, config.threshold_channel) > level {
                LIT
            } else {
                UNLIT
            };
            thr[0] = value;
            thr[1] = value;
            thr[2] = value;
            thr[3] = OPAQUE;
        }
    }
}

/// `old * feedback + new * (1 - feedback)`, rounded and clamped to a byte.
#[inline]
fn blend(old: u8, new: u8, feedback: f64) -> u8 {
    let value = old as f64 * feedback + new as f64 * (1.0 - feedback);
    value.round().clamp(0.0, 255.0) as u8
}

#[inline]
fn channel_value(diff: &[u8], channel: ThresholdChannel) -> f64 {
    match channel {
        ThresholdChannel::Red => diff[0] as f64,
        ThresholdChannel::Luma => {
            0.2126 * diff[0] as f64 + 0.7152 * diff[1] as f64 + 0.0722 * diff[2] as f64
        }
    }
}
