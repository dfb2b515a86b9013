//! Error types for the motion vision engine.

/// Top-level error type for the engine.
///
/// `InvalidFrame` is the only error a caller is expected to hit during normal
/// operation. `LabelingDiverged` and `TrackerInvariant` mean an internal
/// invariant broke and are treated as defects.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Invalid frame ({width}x{height}): {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Connected-component labeling did not converge after {sweeps} sweeps")]
    LabelingDiverged { sweeps: usize },

    #[error("Tracker invariant violated: {message}")]
    TrackerInvariant { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Result type alias using VisionError.
pub type VisionResult<T> = Result<T, VisionError>;

impl VisionError {
    pub fn invalid_frame(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidFrame {
            width,
            height,
            reason: reason.into(),
        }
    }

    pub fn tracker(msg: impl Into<String>) -> Self {
        Self::TrackerInvariant {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Whether this error reports a broken internal invariant rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::LabelingDiverged { .. } | Self::TrackerInvariant { .. }
        )
    }
}
