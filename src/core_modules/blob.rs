// THEORY:
// A `Blob` is the primary output of the Spatial Grouping Layer: one connected
// region of lit pixels, summarized as a bounding box, a center of mass and a
// mass, all normalized to the image size.
//
// Key architectural principles:
// 1.  **Snapshot**: a `Blob` describes one frame. The tracker may carry a
//     previous blob's identity and creation time forward, but the geometry is
//     always recomputed.
// 2.  **Two Generations**: the pipeline keeps exactly two lists of blobs, the
//     current and the previous frame's, in a `BlobGenerations` double buffer.
//     Swapping is an index toggle, never a copy.
// 3.  **Raw Label**: the blob remembers which `LabelMap` id it was built from.
//     That id is meaningless after the next labeling pass and is only used
//     for polygon approximation within the same frame.

use crate::core_modules::geometry::{NormPoint, NormRect};
use crate::events::FrameStamp;

/// A single, spatially coherent object detected in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// Bounding box. Width and height are `(max - min) / size`, so a
    /// one-pixel-wide blob has zero width.
    pub rect: NormRect,
    /// Center of mass.
    pub centroid: NormPoint,
    /// Pixel count divided by the total number of pixels.
    pub mass: f64,
    /// Stable identity. `None` until ids are assigned for the frame.
    pub id: Option<u32>,
    pub(crate) raw_label: u32,
    /// When the tracked object was first seen.
    pub created: FrameStamp,
    /// False once the blob was matched to a blob of the previous frame.
    pub is_new: bool,
    /// Outline approximation, empty unless polygon approximation is enabled.
    pub polygon: Vec<NormPoint>,
}

impl Blob {
    pub fn new(
        rect: NormRect,
        centroid: NormPoint,
        mass: f64,
        raw_label: u32,
        created: FrameStamp,
    ) -> Self {
        Self {
            rect,
            centroid,
            mass,
            id: None,
            raw_label,
            created,
            is_new: true,
            polygon: Vec::new(),
        }
    }

    /// The label this blob carries in the current frame's label map.
    pub fn raw_label(&self) -> u32 {
        self.raw_label
    }
}

/// Selects one of the two blob generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobGeneration {
    Current,
    Previous,
}

/// Ping-pong storage for the current and previous frame's blobs.
#[derive(Debug, Clone, Default)]
pub struct BlobGenerations {
    slots: [Vec<Blob>; 2],
    current: usize,
}

impl BlobGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the current generation the previous one and clears the new
    /// current slot.
    pub fn swap(&mut self) {
        self.current ^= 1;
        self.slots[self.current].clear();
    }

    pub fn current(&self) -> &[Blob] {
        &self.slots[self.current]
    }

    pub fn previous(&self) -> &[Blob] {
        &self.slots[self.current ^ 1]
    }

    pub fn get(&self, generation: BlobGeneration) -> &[Blob] {
        match generation {
            BlobGeneration::Current => self.current(),
            BlobGeneration::Previous => self.previous(),
        }
    }

    pub fn set_current(&mut self, blobs: Vec<Blob>) {
        self.slots[self.current] = blobs;
    }

    /// The current generation, for tracking a new frame against it before it
    /// becomes the previous one.
    pub fn current_mut(&mut self) -> &mut [Blob] {
        &mut self.slots[self.current]
    }
}

/// Index of the first blob carrying `id`.
pub fn find_blob_index_by_id(blobs: &[Blob], id: u32) -> Option<usize> {
    blobs.iter().position(|b| b.id == Some(id))
}

/// Lowest id not carried by any blob in `blobs`.
pub fn first_free_id(blobs: &[Blob]) -> u32 {
    let mut candidate = 0;
    while blobs.iter().any(|b| b.id == Some(candidate)) {
        candidate += 1;
    }
    candidate
}
