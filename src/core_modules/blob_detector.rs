// THEORY:
// `label_blobs` is the connected-component labeler of the Spatial Grouping
// Layer. It turns the binary threshold image into a `LabelMap`: a grid in
// which every lit pixel carries the id of the 8-connected component it
// belongs to, and every unlit pixel carries 0.
//
// Algorithm steps:
// 1.  **Seeding**: the interior of the grid is scanned row-major. Lit pixels
//     receive the current label; every unlit pixel bumps the label. Runs of
//     lit pixels in a row therefore share a label, but a component usually
//     starts out with many different ids.
// 2.  **Merging**: two sweeps, one row-major from the top-left and one
//     column-major from the bottom-right, write the lowest label found in each
//     3x3 neighbourhood onto the cell and all its lit neighbours. The sweep
//     pair repeats until it no longer changes anything. Going in opposite
//     directions lets a minimum travel across most shapes in very few pairs;
//     spirals and long snakes take more.
// 3.  **Compaction**: surviving ids are renumbered 1..=N in first-seen
//     row-major order.
//
// The outermost ring of the grid is never labeled and always stays 0. Every
// neighbour access of an interior cell therefore stays in bounds without a
// check in the inner loop.

use crate::core_modules::pixel_buffer::PixelBuffer;

/// Per-pixel component ids. 0 is background.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            labels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn same_size_as(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }

    /// Reallocates to the new dimensions and zero-fills.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.labels.clear();
        self.labels.resize(width as usize * height as usize, 0);
    }

    pub fn clear(&mut self) {
        self.labels.fill(0);
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Row-major labels.
    pub fn as_slice(&self) -> &[u32] {
        &self.labels
    }
}

pub mod blob_detector {
    use super::*; // Make structs from parent module available.
    use crate::error::{VisionError, VisionResult};
    use tracing::{debug, error};

    /// Labels the lit pixels of `threshold` into `map` and returns the number
    /// of connected components.
    ///
    /// `max_sweeps` bounds the number of merge sweep pairs. `None` uses a
    /// bound derived from the image size that a converging run can never
    /// reach.
    pub fn label_blobs(
        threshold: &PixelBuffer,
        map: &mut LabelMap,
        max_sweeps: Option<usize>,
    ) -> VisionResult<usize> {
        if !map.same_size_as(threshold.width(), threshold.height()) {
            map.resize(threshold.width(), threshold.height());
        }

        // --- 1. Seeding ---
        seed_labels(threshold, map);

        // --- 2. Merging ---
        let width = map.width as usize;
        let height = map.height as usize;
        let cap = max_sweeps.unwrap_or(width * height + 2).max(1);
        let mut sweeps = 0;
        loop {
            // Both sweeps must run every time.
            let changed = merge_sweep_forward(map) | merge_sweep_backward(map);
            sweeps += 1;
            if !changed {
                break;
            }
            if sweeps >= cap {
                error!(sweeps, width, height, "blob labeling did not converge");
                debug_assert!(
                    max_sweeps.is_some(),
                    "blob labeling exceeded its guaranteed sweep bound"
                );
                return Err(VisionError::LabelingDiverged { sweeps });
            }
        }

        // --- 3. Compaction ---
        let count = compact_labels(map);
        debug!(count, sweeps, "labeled blobs");
        Ok(count)
    }

    /// Fills the interior with raw, ascending labels.
    fn seed_labels(threshold: &PixelBuffer, map: &mut LabelMap) {
        map.clear();
        if map.width < 3 || map.height < 3 {
            return;
        }
        let width = map.width as usize;
        let mut label = 1u32;
        for y in 1..map.height - 1 {
            for x in 1..map.width - 1 {
                if threshold.red_at(x, y) > 0 {
                    map.labels[y as usize * width + x as usize] = label;
                } else {
                    label += 1;
                }
            }
        }
    }

    /// Row-major sweep from the top-left corner.
    fn merge_sweep_forward(map: &mut LabelMap) -> bool {
        if map.width < 3 || map.height < 3 {
            return false;
        }
        let width = map.width as usize;
        let mut changed = false;
        for y in 1..map.height as usize - 1 {
            for x in 1..width - 1 {
                changed |= merge_cell(&mut map.labels, width, y * width + x);
            }
        }
        changed
    }

    /// Column-major sweep from the bottom-right corner.
    fn merge_sweep_backward(map: &mut LabelMap) -> bool {
        if map.width < 3 || map.height < 3 {
            return false;
        }
        let width = map.width as usize;
        let mut changed = false;
        for x in (1..width - 1).rev() {
            for y in (1..map.height as usize - 1).rev() {
                changed |= merge_cell(&mut map.labels, width, y * width + x);
            }
        }
        changed
    }

    /// Writes the lowest label of the 3x3 neighbourhood around `center` onto
    /// the cell and every lit neighbour. `center` must be an interior cell.
    #[inline]
    fn merge_cell(labels: &mut [u32], width: usize, center: usize) -> bool {
        let own = labels[center];
        if own == 0 {
            return false;
        }
        let neighbours = [
            center - width,
            center - width + 1,
            center + 1,
            center + width + 1,
            center + width,
            center + width - 1,
            center - 1,
            center - width - 1,
        ];

        let mut lowest = own;
        for &n in &neighbours {
            let v = labels[n];
            if v > 0 && v < lowest {
                lowest = v;
            }
        }

        let mut changed = own != lowest;
        labels[center] = lowest;
        for &n in &neighbours {
            let v = labels[n];
            if v > 0 && v != lowest {
                labels[n] = lowest;
                changed = true;
            }
        }
        changed
    }

    /// Renumbers labels to 1..=N in first-seen row-major order. Returns N.
    fn compact_labels(map: &mut LabelMap) -> usize {
        let Some(&max_raw) = map.labels.iter().max() else {
            return 0;
        };
        let mut remap = vec![0u32; max_raw as usize + 1];
        let mut next = 0u32;
        for label in map.labels.iter_mut() {
            if *label == 0 {
                continue;
            }
            let slot = &mut remap[*label as usize];
            if *slot == 0 {
                next += 1;
                *slot = next;
            }
            *label = *slot;
        }
        next as usize
    }
}
