use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{CalderaError, Result};
use crate::stats::PixelStats;

/// Kind of calibration exposure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    Bias,
    Dark,
    Flat,
}

impl FrameKind {
    /// Lowercase name used in master filenames.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::Dark => "dark",
            Self::Flat => "flat",
        }
    }

    /// Subdirectory name used for raw frames of this kind inside a session.
    pub fn raw_dir_name(&self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::Dark => "darks",
            Self::Flat => "flats",
        }
    }

    /// Parse a kind from a FITS `IMAGETYP` value or a CLI word.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.contains("bias") || s.contains("offset") {
            Some(Self::Bias)
        } else if s.contains("dark") {
            Some(Self::Dark)
        } else if s.contains("flat") {
            Some(Self::Flat)
        } else {
            None
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "Bias"),
            Self::Dark => write!(f, "Dark"),
            Self::Flat => write!(f, "Flat"),
        }
    }
}

/// Identity and acquisition metadata of a raw calibration frame, as supplied
/// by a frame source. No pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    pub path: PathBuf,
    pub kind: FrameKind,
    /// Seconds. Always 0.0 for bias frames.
    pub exposure_time: f64,
    pub gain: Option<i32>,
    /// Only ever set on flat frames.
    pub filter: Option<String>,
}

impl FrameDescriptor {
    pub fn bias(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: FrameKind::Bias,
            exposure_time: 0.0,
            gain: None,
            filter: None,
        }
    }

    pub fn dark(path: impl Into<PathBuf>, exposure_time: f64) -> Self {
        Self {
            path: path.into(),
            kind: FrameKind::Dark,
            exposure_time,
            gain: None,
            filter: None,
        }
    }

    pub fn flat(path: impl Into<PathBuf>, exposure_time: f64, filter: Option<String>) -> Self {
        Self {
            path: path.into(),
            kind: FrameKind::Flat,
            exposure_time,
            gain: None,
            filter: filter.filter(|f| !f.trim().is_empty()),
        }
    }

    /// Build a descriptor of any kind, normalising kind-specific fields:
    /// bias exposure is forced to zero and filters are dropped from non-flats.
    pub fn new(
        path: impl Into<PathBuf>,
        kind: FrameKind,
        exposure_time: f64,
        gain: Option<i32>,
        filter: Option<String>,
    ) -> Self {
        let descriptor = match kind {
            FrameKind::Bias => Self::bias(path),
            FrameKind::Dark => Self::dark(path, exposure_time),
            FrameKind::Flat => Self::flat(path, exposure_time, filter),
        };
        descriptor.with_gain(gain)
    }

    pub fn with_gain(mut self, gain: Option<i32>) -> Self {
        self.gain = gain;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A loaded calibration exposure. Pixel values are in ADU.
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub descriptor: FrameDescriptor,
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Native bit depth of the source file (8, 16, 32 or 64)
    pub bit_depth: u8,
    stats: OnceLock<PixelStats>,
}

impl RawFrame {
    pub fn new(descriptor: FrameDescriptor, data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            descriptor,
            data,
            bit_depth,
            stats: OnceLock::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn kind(&self) -> FrameKind {
        self.descriptor.kind
    }

    pub fn path(&self) -> &Path {
        &self.descriptor.path
    }

    /// Summary statistics, computed on first access.
    pub fn stats(&self) -> &PixelStats {
        self.stats.get_or_init(|| PixelStats::of(&self.data))
    }
}

/// Fail with `DimensionMismatch` unless every frame has the first frame's
/// shape.
pub fn ensure_same_dimensions(frames: &[&RawFrame]) -> Result<()> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    let expected = first.data.dim();
    for frame in &frames[1..] {
        let found = frame.data.dim();
        if found != expected {
            return Err(CalderaError::DimensionMismatch {
                reference: first.path().to_path_buf(),
                expected,
                path: frame.path().to_path_buf(),
                found,
            });
        }
    }
    Ok(())
}
