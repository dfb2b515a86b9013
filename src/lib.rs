// THEORY:
// This file is the main entry point for the `motion_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers (capture loops, overlays,
// telemetry bridges).
//
// The primary goal is to export the `MotionPipeline` and its associated data
// structures (`VisionConfig`, `FrameReport`, `Blob`, `ZoneEvent`, etc.) as the
// high-level interface for the entire engine. The per-stage building blocks in
// `core_modules` stay public for callers that want to run a single stage on
// their own buffers.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod events;
pub mod logging;
pub mod pipeline;

pub use config::{MirrorMode, RejectBlobs, ThresholdChannel, VisionConfig};
pub use core_modules::pixel_buffer::{Frame, PixelBuffer};
pub use error::{VisionError, VisionResult};
pub use events::{FrameStamp, ZoneEvent, ZoneEventHandler};
pub use pipeline::{
    Blob, BlobGeneration, FrameReport, MotionPipeline, NormPoint, NormRect, ZoneId,
};
