// THEORY:
// The `pipeline` module is the final, top-level API for the entire vision engine.
// It encapsulates the full per-frame flow into a single, easy-to-use interface:
// one `MotionPipeline` owns every buffer, the zone list and both blob
// generations, and one `update` call takes a frame through all stages.
//
// Key architectural principles:
// 1.  **Frame-Stepped**: `update` processes one frame to completion before it
//     returns. There is no internal concurrency and no suspension point.
// 2.  **Exclusive Ownership**: the pipeline owns all scratch state (label map,
//     blob generations). Callers only get shared views between updates.
// 3.  **Fail Fast**: an invalid frame is rejected before any state changes.
//     A broken internal invariant aborts the frame and is returned as an error.
// 4.  **Live Configuration**: `VisionConfig` is held by the pipeline and can be
//     changed freely between frames through `config_mut`.

use crate::config::{VisionConfig, polygon_points};
use crate::core_modules::active_zone::{ActiveZone, ZoneMonitor, hit_test};
use crate::core_modules::blob::{self, BlobGenerations};
use crate::core_modules::blob_detector::LabelMap;
use crate::core_modules::blob_detector::blob_detector::label_blobs;
use crate::core_modules::blob_filter::{aggregate, reject_blobs};
use crate::core_modules::image_filter::ImageFilter;
use crate::core_modules::pixel_buffer::{Frame, PixelBuffer};
use crate::core_modules::polygon::approximate_polygons;
use crate::core_modules::tracker::{assign_index_ids, track_blobs};
use crate::error::{VisionError, VisionResult};
use crate::events::{FrameStamp, ZoneEvent, ZoneEventHandler};
use serde::Serialize;
use tracing::{debug, error, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::active_zone::ZoneId;
pub use crate::core_modules::blob::{Blob, BlobGeneration};
pub use crate::core_modules::geometry::{NormPoint, NormRect};

/// The output of the vision pipeline for a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    /// Zone flips raised by this frame, in zone order.
    pub zone_events: Vec<ZoneEvent>,
    /// Blobs in the current generation after this frame.
    pub blob_count: usize,
}

/// The main, top-level struct for the vision engine.
pub struct MotionPipeline {
    config: VisionConfig,
    filter: ImageFilter,
    zones: ZoneMonitor,
    label_map: LabelMap,
    blobs: BlobGenerations,
    last_update: Option<FrameStamp>,
}

impl MotionPipeline {
    pub fn new(config: VisionConfig) -> Self {
        let config = config.sanitized();
        let zones = ZoneMonitor::new(config.active_zones_fill_threshold);
        Self {
            config,
            filter: ImageFilter::new(),
            zones,
            label_map: LabelMap::default(),
            blobs: BlobGenerations::new(),
            last_update: None,
        }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Changes take effect on the next `update`.
    pub fn config_mut(&mut self) -> &mut VisionConfig {
        &mut self.config
    }

    /// Processes one frame: image filter, then active zones, then blobs.
    pub fn update(&mut self, frame: &Frame<'_>, stamp: FrameStamp) -> VisionResult<FrameReport> {
        if let Err(err) = check_frame(frame) {
            warn!(%err, frame = stamp.frame, "rejecting frame");
            return Err(err);
        }

        self.filter.process(frame, &self.config);
        self.fit_label_map();

        let mut report = FrameReport::default();
        if self.config.handle_active_zones {
            // The config is the source of truth; clamping writes back so a
            // stored out-of-range value is corrected once, not every frame.
            if self.zones.fill_threshold() != self.config.active_zones_fill_threshold {
                self.set_zones_fill_threshold(self.config.active_zones_fill_threshold);
            }
            report.zone_events = self.zones.update(self.filter.threshold(), stamp);
        }

        if self.config.handle_blobs {
            if let Err(err) = self.update_blobs(stamp) {
                error!(%err, frame = stamp.frame, "blob stage failed");
                return Err(err);
            }
            report.blob_count = self.blobs.current().len();
        }

        self.last_update = Some(stamp);
        debug!(
            frame = stamp.frame,
            blobs = report.blob_count,
            zone_events = report.zone_events.len(),
            "frame processed"
        );
        Ok(report)
    }

    fn update_blobs(&mut self, stamp: FrameStamp) -> VisionResult<()> {
        let count = label_blobs(
            self.filter.threshold(),
            &mut self.label_map,
            self.config.max_label_sweeps,
        )?;
        let mut found = aggregate(&self.label_map, count, &self.config, stamp);
        found = reject_blobs(found, self.config.reject_blobs);

        if self.config.approximate_blob_polygons {
            self.config.points_per_polygon = polygon_points(self.config.points_per_polygon);
            approximate_polygons(&mut found, &self.label_map, self.config.points_per_polygon);
        }

        // Still the last frame's blobs; they become the previous generation
        // only once tracking succeeded.
        let last = self.blobs.current_mut();
        if self.config.track_blobs {
            track_blobs(&mut found, last, self.config.track_blobs_max_norm_dist)?;
        } else {
            assign_index_ids(&mut found);
        }

        self.blobs.swap();
        self.blobs.set_current(found);
        Ok(())
    }

    /// Keeps the label map the size of the image buffers, even when blobs
    /// are not handled.
    fn fit_label_map(&mut self) {
        let (width, height) = (self.filter.width(), self.filter.height());
        if !self.label_map.same_size_as(width, height) {
            self.label_map.resize(width, height);
        }
    }

    /// Seeds the background with `frame` (used when the background is static).
    pub fn set_background(&mut self, frame: &Frame<'_>) -> VisionResult<()> {
        if let Err(err) = check_frame(frame) {
            warn!(%err, "rejecting background frame");
            return Err(err);
        }
        self.filter.set_background(frame, &self.config);
        self.fit_label_map();
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.filter.width()
    }

    pub fn height(&self) -> u32 {
        self.filter.height()
    }

    pub fn last_update(&self) -> Option<FrameStamp> {
        self.last_update
    }

    pub fn current_image(&self) -> &PixelBuffer {
        self.filter.current()
    }

    pub fn background_image(&self) -> &PixelBuffer {
        self.filter.background()
    }

    pub fn difference_image(&self) -> &PixelBuffer {
        self.filter.difference()
    }

    pub fn threshold_image(&self) -> &PixelBuffer {
        self.filter.threshold()
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    // --- Active zones ---

    pub fn add_zone(&mut self, id: impl Into<ZoneId>, rect: NormRect) -> &mut ActiveZone {
        self.zones.add(id, rect)
    }

    pub fn add_zone_with_handler(
        &mut self,
        id: impl Into<ZoneId>,
        rect: NormRect,
        handler: impl ZoneEventHandler + 'static,
    ) -> &mut ActiveZone {
        self.zones.add_with_handler(id, rect, handler)
    }

    /// Removes every zone with `id` and returns how many were removed.
    pub fn remove_zone(&mut self, id: impl Into<ZoneId>) -> usize {
        let id = id.into();
        let removed = self.zones.remove(&id);
        if removed == 0 {
            debug!(zone = %id, "no active zone to remove");
        }
        removed
    }

    pub fn zone(&self, id: impl Into<ZoneId>) -> Option<&ActiveZone> {
        self.zones.get(&id.into())
    }

    pub fn zone_mut(&mut self, id: impl Into<ZoneId>) -> Option<&mut ActiveZone> {
        self.zones.get_mut(&id.into())
    }

    pub fn zones(&self) -> &[ActiveZone] {
        self.zones.zones()
    }

    /// Sets the fill threshold of every zone, existing and future.
    pub fn set_zones_fill_threshold(&mut self, value: f64) {
        self.zones.set_fill_threshold(value);
        self.config.active_zones_fill_threshold = self.zones.fill_threshold();
    }

    pub fn zones_fill_threshold(&self) -> f64 {
        self.zones.fill_threshold()
    }

    /// Whether the threshold image is lit under the normalized point.
    pub fn hit_test(&self, norm_x: f64, norm_y: f64) -> bool {
        hit_test(self.filter.threshold(), norm_x, norm_y)
    }

    // --- Blobs ---

    pub fn blobs(&self) -> &[Blob] {
        self.blobs.current()
    }

    pub fn previous_blobs(&self) -> &[Blob] {
        self.blobs.previous()
    }

    pub fn blobs_at(&self, generation: BlobGeneration) -> &[Blob] {
        self.blobs.get(generation)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.current().len()
    }

    pub fn find_blob_index_by_id(&self, generation: BlobGeneration, id: u32) -> Option<usize> {
        blob::find_blob_index_by_id(self.blobs.get(generation), id)
    }

    pub fn first_free_id(&self, generation: BlobGeneration) -> u32 {
        blob::first_free_id(self.blobs.get(generation))
    }
}

fn check_frame(frame: &Frame<'_>) -> VisionResult<()> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(VisionError::invalid_frame(
            frame.width(),
            frame.height(),
            "dimensions must be positive",
        ));
    }
    Ok(())
}

impl Default for MotionPipeline {
    fn default() -> Self {
        Self::new(VisionConfig::default())
    }
}
