mod combiner;
pub mod naming;
pub mod stamping;

use std::fmt;

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combine::{CombineMethod, RejectionMethod};
use crate::frame::{FrameDescriptor, FrameKind};
use crate::io::fits::{FitsHeader, FitsValue};
use crate::stats::PixelStats;

pub use combiner::{combine, combine_frames, combine_reported};

/// Metadata to stamp on a master when it cannot be inferred from the inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataOverrides {
    pub exposure_time: Option<f64>,
    pub gain: Option<i32>,
    pub filter: Option<String>,
}

/// Everything needed to build one master frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombinationRequest {
    /// Name of the owning calibration session.
    pub session: String,
    pub kind: FrameKind,
    /// Selected frames. Order does not affect the result.
    pub frames: Vec<FrameDescriptor>,
    pub method: CombineMethod,
    pub rejection: RejectionMethod,
    #[serde(default)]
    pub overrides: MetadataOverrides,
}

impl CombinationRequest {
    /// Request with the default policy (median, 3-sigma clipping).
    pub fn new(session: impl Into<String>, kind: FrameKind, frames: Vec<FrameDescriptor>) -> Self {
        Self {
            session: session.into(),
            kind,
            frames,
            method: CombineMethod::default(),
            rejection: RejectionMethod::default(),
            overrides: MetadataOverrides::default(),
        }
    }

    pub fn with_method(mut self, method: CombineMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_rejection(mut self, rejection: RejectionMethod) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn with_overrides(mut self, overrides: MetadataOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Advisory raised while stamping master metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "note")]
pub enum MasterNote {
    AmbiguousExposure { values: Vec<f64> },
    AmbiguousGain { values: Vec<Option<i32>> },
    AmbiguousFilter { values: Vec<Option<String>> },
}

impl fmt::Display for MasterNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AmbiguousExposure { values } => {
                write!(f, "input exposure times disagree ({values:?}); exposure left unset")
            }
            Self::AmbiguousGain { values } => {
                write!(f, "input gains disagree ({values:?}); gain left unset")
            }
            Self::AmbiguousFilter { values } => {
                write!(f, "input filters disagree ({values:?}); filter left unset")
            }
        }
    }
}

/// Statistics of a combined master.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MasterStats {
    pub pixels: PixelStats,
    /// Per-pixel samples discarded by rejection, summed over the image.
    pub rejected_samples: u64,
}

/// Persisted description of a master frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasterRecord {
    pub id: Uuid,
    pub session: String,
    pub kind: FrameKind,
    pub width: usize,
    pub height: usize,
    /// Nominal number of input frames.
    pub frame_count: usize,
    pub method: CombineMethod,
    pub rejection: RejectionMethod,
    pub exposure_time: Option<f64>,
    pub gain: Option<i32>,
    pub filter: Option<String>,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub stats: MasterStats,
    #[serde(default)]
    pub notes: Vec<MasterNote>,
}

impl MasterRecord {
    /// Header cards describing this master.
    pub fn fits_header(&self) -> FitsHeader {
        let mut h = FitsHeader::new();
        h.set(
            "IMAGETYP",
            FitsValue::Text(format!("Master {}", self.kind)),
            Some("calibration frame type"),
        );
        if let Some(t) = self.exposure_time {
            h.set("EXPTIME", FitsValue::Float(t), Some("exposure time [s]"));
        }
        if let Some(g) = self.gain {
            h.set("GAIN", FitsValue::Integer(g as i64), Some("camera gain setting"));
        }
        if let Some(ref filter) = self.filter {
            h.set("FILTER", FitsValue::Text(filter.clone()), None);
        }
        h.set(
            "NCOMBINE",
            FitsValue::Integer(self.frame_count as i64),
            Some("number of combined frames"),
        );
        h.set("COMBMETH", FitsValue::Text(self.method.code().into()), None);
        h.set("REJMETH", FitsValue::Text(self.rejection.code().into()), None);
        if let RejectionMethod::SigmaClip(p) = self.rejection {
            h.set("CLIPSIG", FitsValue::Float(p.sigma as f64), Some("sigma clip threshold"));
        }
        h.set("SESSION", FitsValue::Text(self.session.clone()), None);
        h.set("MASTERID", FitsValue::Text(self.id.to_string()), None);
        h.set(
            "DATE",
            FitsValue::Text(self.created_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Some("creation time (UTC)"),
        );
        h
    }
}

/// A combined master frame: its record plus the combined pixels (ADU).
#[derive(Clone, Debug)]
pub struct MasterFrame {
    pub record: MasterRecord,
    pub data: Array2<f32>,
}

impl MasterFrame {
    pub fn filename(&self) -> &str {
        &self.record.filename
    }
}
