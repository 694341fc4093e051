use std::path::PathBuf;

use thiserror::Error;

use crate::frame::FrameKind;

#[derive(Error, Debug)]
pub enum CalderaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load frame {}: {reason}", path.display())]
    FrameLoad { path: PathBuf, reason: String },

    #[error(
        "Dimension mismatch: {} is {}x{} but {} is {}x{}",
        reference.display(), expected.1, expected.0, path.display(), found.1, found.0
    )]
    DimensionMismatch {
        reference: PathBuf,
        expected: (usize, usize),
        path: PathBuf,
        found: (usize, usize),
    },

    #[error("Empty frame selection")]
    EmptySelection,

    #[error("Frame {} is a {found} frame, expected {expected}", path.display())]
    KindMismatch {
        path: PathBuf,
        expected: FrameKind,
        found: FrameKind,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Master not found: {0}")]
    MasterNotFound(String),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CalderaError {
    /// Whether this error aborts work before any computation (as opposed to
    /// an environmental failure while persisting).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::FrameLoad { .. }
                | Self::DimensionMismatch { .. }
                | Self::EmptySelection
                | Self::KindMismatch { .. }
                | Self::InvalidRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CalderaError>;
