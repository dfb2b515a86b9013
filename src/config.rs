//! Engine configuration.
//!
//! Every field is a plain, freely mutable value: the pipeline reads the
//! configuration at the start of each stage, so changes made between frames
//! take effect on the next `update`.

use crate::core_modules::tracker::DEFAULT_MAX_NORM_DIST;
use crate::error::{VisionError, VisionResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Horizontal/vertical flip applied to every incoming frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

/// Which channel of the difference image decides whether a pixel is lit.
///
/// Downstream stages (zones, labeler, hit test) only ever read the first
/// sample of the threshold image, which is written identically to R, G and B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdChannel {
    /// Test the red channel of the difference image only.
    #[default]
    Red,
    /// Test the Rec. 709 luma of the difference image.
    Luma,
}

/// Post-filter applied among blobs that survived the mass/area bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectBlobs {
    #[default]
    None,
    /// Drop blobs whose bounding box lies inside another blob's box.
    Inner,
    /// Drop blobs whose bounding box encloses another blob's box.
    Outer,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "motion_vision=debug,warn").
    pub level: String,
    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration for the MotionPipeline, allowing for tunable behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub mirror: MirrorMode,
    /// When false the background is only changed by `set_background`.
    pub progressive_background: bool,
    /// Weight of the old background in the running average, in [0, 1].
    pub image_filter_feedback: f64,
    /// Fraction of 255 a difference sample must exceed to count as lit, in [0, 1].
    pub image_filter_threshold: f64,
    pub threshold_channel: ThresholdChannel,

    pub handle_active_zones: bool,
    /// Fill threshold given to every zone, existing and future.
    pub active_zones_fill_threshold: f64,

    pub handle_blobs: bool,
    pub reject_blobs: RejectBlobs,
    pub track_blobs: bool,
    /// Max centroid distance (normalized units) for two blobs to be the same object.
    pub track_blobs_max_norm_dist: f64,
    pub min_blob_mass: f64,
    pub max_blob_mass: f64,
    pub min_blob_area: f64,
    pub max_blob_area: f64,
    pub approximate_blob_polygons: bool,
    pub points_per_polygon: usize,
    /// Upper bound on merge sweeps before labeling is declared diverged.
    /// `None` derives the cap from the image size.
    pub max_label_sweeps: Option<usize>,

    pub logging: LoggingConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            mirror: MirrorMode::None,
            progressive_background: true,
            image_filter_feedback: 0.92,
            image_filter_threshold: 0.4,
            threshold_channel: ThresholdChannel::Red,
            handle_active_zones: false,
            active_zones_fill_threshold: 0.02,
            handle_blobs: false,
            reject_blobs: RejectBlobs::None,
            track_blobs: false,
            track_blobs_max_norm_dist: DEFAULT_MAX_NORM_DIST,
            min_blob_mass: 0.0002,
            max_blob_mass: 0.5,
            min_blob_area: 0.0002,
            max_blob_area: 0.5,
            approximate_blob_polygons: false,
            points_per_polygon: 6,
            max_label_sweeps: None,
            logging: LoggingConfig::default(),
        }
    }
}

pub const MIN_POLYGON_POINTS: usize = 3;

impl VisionConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> VisionResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> VisionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            VisionError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Returns a copy with out-of-range values corrected. Each correction is
    /// logged as a warning.
    pub fn sanitized(mut self) -> Self {
        self.image_filter_feedback =
            clamp_unit("image_filter_feedback", self.image_filter_feedback);
        self.image_filter_threshold =
            clamp_unit("image_filter_threshold", self.image_filter_threshold);
        self.active_zones_fill_threshold = clamp_unit(
            "active_zones_fill_threshold",
            self.active_zones_fill_threshold,
        );
        if self.track_blobs_max_norm_dist < 0.0 {
            warn!(
                value = self.track_blobs_max_norm_dist,
                "track_blobs_max_norm_dist is negative, using 0"
            );
            self.track_blobs_max_norm_dist = 0.0;
        }
        self.points_per_polygon = polygon_points(self.points_per_polygon);
        if self.min_blob_mass > self.max_blob_mass {
            warn!(
                min = self.min_blob_mass,
                max = self.max_blob_mass,
                "blob mass bounds are inverted, swapping"
            );
            std::mem::swap(&mut self.min_blob_mass, &mut self.max_blob_mass);
        }
        if self.min_blob_area > self.max_blob_area {
            warn!(
                min = self.min_blob_area,
                max = self.max_blob_area,
                "blob area bounds are inverted, swapping"
            );
            std::mem::swap(&mut self.min_blob_area, &mut self.max_blob_area);
        }
        self
    }
}

/// Raises a polygon point count below the minimum, logging the correction.
pub fn polygon_points(requested: usize) -> usize {
    if requested < MIN_POLYGON_POINTS {
        warn!(
            requested,
            "minimum valid points_per_polygon is {MIN_POLYGON_POINTS}, using {MIN_POLYGON_POINTS}"
        );
        MIN_POLYGON_POINTS
    } else {
        requested
    }
}

pub(crate) fn clamp_unit(name: &str, value: f64) -> f64 {
    if value.is_nan() {
        warn!(field = name, "value is NaN, using 0");
        return 0.0;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!(field = name, value, clamped, "value outside [0, 1], clamping");
    }
    clamped
}
