//! Mirror transform: copies a frame into an owned buffer, optionally flipped.

use crate::config::MirrorMode;
use crate::core_modules::pixel_buffer::{CHANNELS, Frame, PixelBuffer};

/// Copies `frame` into `target` applying `mode`. `target` must already have
/// the frame's dimensions.
pub fn mirror_into(frame: &Frame<'_>, mode: MirrorMode, target: &mut PixelBuffer) {
    debug_assert!(target.same_size_as(frame.width(), frame.height()));

    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let row_len = width * CHANNELS;
    let src = frame.as_bytes();
    let dst = target.as_bytes_mut();

    let (flip_x, flip_y) = match mode {
        MirrorMode::None => (false, false),
        MirrorMode::Horizontal => (true, false),
        MirrorMode::Vertical => (false, true),
        MirrorMode::Both => (true, true),
    };

    for y in 0..height {
        let src_y = if flip_y { height - 1 - y } else { y };
        let src_row = &src[src_y * row_len..(src_y + 1) * row_len];
        let dst_row = &mut dst[y * row_len..(y + 1) * row_len];
        if flip_x {
            for (dst_px, src_px) in dst_row
                .chunks_exact_mut(CHANNELS)
                .zip(src_row.chunks_exact(CHANNELS).rev())
            {
                dst_px.copy_from_slice(src_px);
            }
        } else {
            dst_row.copy_from_slice(src_row);
        }
    }
}
