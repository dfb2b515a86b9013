//! Blob aggregation and filtering.
//!
//! Turns a compacted `LabelMap` into `Blob`s, dropping components whose
//! mass or bounding-box area fall outside the configured bounds, and applies
//! the optional inner/outer rejection among the survivors.

use crate::config::{RejectBlobs, VisionConfig};
use crate::core_modules::blob::Blob;
use crate::core_modules::blob_detector::LabelMap;
use crate::core_modules::geometry::{NormPoint, NormRect};
use crate::events::FrameStamp;
use tracing::debug;

/// Running sums for one label.
#[derive(Debug, Clone, Copy)]
struct LabelStats {
    count: u64,
    sum_x: u64,
    sum_y: u64,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Default for LabelStats {
    fn default() -> Self {
        Self {
            count: 0,
            sum_x: 0,
            sum_y: 0,
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
        }
    }
}

/// Builds blobs for labels `1..=label_count` in label order and keeps those
/// whose normalized mass and bounding-box area are within bounds.
pub fn aggregate(
    map: &LabelMap,
    label_count: usize,
    config: &VisionConfig,
    stamp: FrameStamp,
) -> Vec<Blob> {
    let width = map.width();
    let height = map.height();
    let total = width as f64 * height as f64;
    if label_count == 0 || total == 0.0 {
        return Vec::new();
    }

    // --- Single full-grid scan ---
    let mut stats = vec![LabelStats::default(); label_count];
    for (i, &label) in map.as_slice().iter().enumerate() {
        if label == 0 {
            continue;
        }
        let x = (i % width as usize) as u32;
        let y = (i / width as usize) as u32;
        let s = &mut stats[label as usize - 1];
        s.count += 1;
        s.sum_x += x as u64;
        s.sum_y += y as u64;
        s.min_x = s.min_x.min(x);
        s.min_y = s.min_y.min(y);
        s.max_x = s.max_x.max(x);
        s.max_y = s.max_y.max(y);
    }

    let mut blobs = Vec::new();
    for (index, s) in stats.iter().enumerate() {
        if s.count == 0 {
            continue;
        }
        let mass = s.count as f64 / total;
        let area = (s.max_x - s.min_x) as f64 * (s.max_y - s.min_y) as f64 / total;
        if mass < config.min_blob_mass
            || mass > config.max_blob_mass
            || area < config.min_blob_area
            || area > config.max_blob_area
        {
            continue;
        }

        let centroid = NormPoint::new(
            s.sum_x as f64 / s.count as f64 / width as f64,
            s.sum_y as f64 / s.count as f64 / height as f64,
        );
        let rect = NormRect::new(
            s.min_x as f64 / width as f64,
            s.min_y as f64 / height as f64,
            (s.max_x - s.min_x) as f64 / width as f64,
            (s.max_y - s.min_y) as f64 / height as f64,
        );
        blobs.push(Blob::new(rect, centroid, mass, index as u32 + 1, stamp));
    }

    debug!(
        labels = label_count,
        kept = blobs.len(),
        "aggregated blobs"
    );
    blobs
}

/// Applies the configured containment rejection. Every decision is made
/// against the full input list; identical boxes never reject each other.
pub fn reject_blobs(blobs: Vec<Blob>, mode: RejectBlobs) -> Vec<Blob> {
    let rejected: Vec<bool> = match mode {
        RejectBlobs::None => return blobs,
        RejectBlobs::Inner => (0..blobs.len())
            .map(|j| {
                blobs.iter().enumerate().any(|(i, outer)| {
                    i != j && outer.rect != blobs[j].rect && outer.rect.encloses(&blobs[j].rect)
                })
            })
            .collect(),
        RejectBlobs::Outer => (0..blobs.len())
            .map(|i| {
                blobs.iter().enumerate().any(|(j, inner)| {
                    i != j && inner.rect != blobs[i].rect && blobs[i].rect.encloses(&inner.rect)
                })
            })
            .collect(),
    };

    blobs
        .into_iter()
        .zip(rejected)
        .filter_map(|(blob, drop)| (!drop).then_some(blob))
        .collect()
}
