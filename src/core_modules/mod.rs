// THEORY:
// The `core_modules` are the building blocks of the engine, one file per
// stage of the per-frame flow:
//
//   frame -> mirror -> image_filter -> active_zone
//                                   -> blob_detector -> blob_filter -> tracker -> polygon
//
// Each stage reads the buffers produced by the stage before it and owns no
// state across frames except what `MotionPipeline` hands it.

pub mod active_zone;
pub mod blob;
pub mod blob_detector;
pub mod blob_filter;
pub mod geometry;
pub mod image_filter;
pub mod mirror;
pub mod pixel_buffer;
pub mod polygon;
pub mod tracker;
pub mod utils;
