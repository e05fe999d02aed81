use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a heatmap request.
///
/// Missing gaze data and unreadable stimulus images are not errors; they are
/// reported through [`crate::pipeline::HeatmapReport`] so callers can render a
/// message without inspecting error text.
#[derive(Error, Debug)]
pub enum HeatmapError {
    #[error("invalid canvas dimensions {width}x{height}: both must be positive")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("invalid sigma {0}: must be finite and positive")]
    InvalidSigma(f64),
    #[error("invalid peak {0}: must be finite and positive")]
    InvalidPeak(f64),
    #[error("invalid blend alpha {0}: must lie in [0, 1]")]
    InvalidAlpha(f32),
    #[error("invalid user id {0:?}: must be non-empty and free of path separators")]
    InvalidUserId(String),
    #[error("failed to read fixation source {}: {source}", path.display())]
    FixationSource {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode heatmap {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("heatmap worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, HeatmapError>;
