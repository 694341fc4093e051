//! Sensor characterization from a bias pair and a flat pair.
//!
//! Read noise comes from the difference of the two bias frames, gain from the
//! photon-transfer relation on the difference of the two flats. Anything
//! statistically doubtful is recorded as a [`CharacterizationNote`] and
//! lowers the profile's confidence; only structural problems (unreadable
//! files, mismatched dimensions) are errors.

mod characterizer;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frame::FrameDescriptor;

pub use characterizer::{characterize, characterize_frames, characterize_reported};

/// Inputs of one characterization run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationRequest {
    pub session: String,
    pub camera_model: String,
    pub gain_setting: Option<i32>,
    /// Camera offset (black level) setting.
    #[serde(default)]
    pub offset: Option<i32>,
    /// Binning mode, e.g. `2x2`.
    #[serde(default)]
    pub binning: Option<String>,
    /// Sensor temperature in degrees Celsius, if known.
    pub temperature: Option<f64>,
    pub bias: [FrameDescriptor; 2],
    pub flats: [FrameDescriptor; 2],
}

impl CharacterizationRequest {
    pub fn settings(&self) -> SensorSettings {
        SensorSettings {
            session: self.session.clone(),
            camera_model: self.camera_model.clone(),
            gain_setting: self.gain_setting,
            offset: self.offset,
            binning: self.binning.clone(),
            temperature: self.temperature,
        }
    }
}

/// Camera settings recorded on a profile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    pub session: String,
    pub camera_model: String,
    pub gain_setting: Option<i32>,
    pub offset: Option<i32>,
    pub binning: Option<String>,
    pub temperature: Option<f64>,
}

/// Which difference image an advisory refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifferencePair {
    Bias,
    Flat,
}

impl fmt::Display for DifferencePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias => write!(f, "bias"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Advisory raised while characterizing a sensor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "note")]
pub enum CharacterizationNote {
    FlatPairTooSimilar,
    ZeroVariance { pair: DifferencePair },
    NegativeShotVariance { variance: f64 },
    NonPositiveSignal { signal: f64 },
    GainFallback { gain: f64 },
    FlatLevelOutOfRange { percent: f64 },
    UnusualGain { gain: f64 },
    UnusualReadNoise { read_noise: f64 },
    FullWellApproximation,
    NonFinitePixels { count: usize },
}

impl CharacterizationNote {
    /// Amount subtracted from the base confidence.
    pub fn penalty(&self) -> f64 {
        match self {
            Self::FullWellApproximation => 0.0,
            Self::UnusualGain { .. } | Self::UnusualReadNoise { .. } => 0.2,
            _ => 0.1,
        }
    }
}

impl fmt::Display for CharacterizationNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlatPairTooSimilar => write!(
                f,
                "flat pair too similar; gain/read-noise estimate unreliable"
            ),
            Self::ZeroVariance { pair } => write!(
                f,
                "degenerate input: zero variance detected in the {pair} difference image"
            ),
            Self::NegativeShotVariance { variance } => write!(
                f,
                "shot-noise variance was negative ({variance:.3} ADU^2) and was clamped to zero"
            ),
            Self::NonPositiveSignal { signal } => {
                write!(f, "flat signal above bias is not positive ({signal:.1} ADU)")
            }
            Self::GainFallback { gain } => {
                write!(f, "gain could not be measured; using fallback {gain:.1} e-/ADU")
            }
            Self::FlatLevelOutOfRange { percent } => write!(
                f,
                "flats at {percent:.1}% of saturation, outside the recommended range"
            ),
            Self::UnusualGain { gain } => write!(f, "gain {gain:.3} e-/ADU seems unusual"),
            Self::UnusualReadNoise { read_noise } => {
                write!(f, "read noise {read_noise:.2} e- seems unusual")
            }
            Self::FullWellApproximation => write!(
                f,
                "full-well capacity approximated from the flat signal level; \
                 a saturation series is needed for an exact value"
            ),
            Self::NonFinitePixels { count } => {
                write!(f, "{count} NaN or infinite pixels were left out of the statistics")
            }
        }
    }
}

/// Intermediate measurements behind a profile, in ADU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterizationStats {
    pub bias_means: [f64; 2],
    pub bias_std_devs: [f64; 2],
    pub bias_level: f64,
    pub read_noise_adu: f64,
    pub flat_means: [f64; 2],
    pub flat_std_devs: [f64; 2],
    /// Mean flat level as a percentage of the configured saturation level.
    pub flat_level_percent: f64,
    /// Population variance of `flat1 - flat2`.
    pub flat_diff_variance: f64,
    /// Shot-noise variance after removing read noise, clamped at zero.
    pub shot_variance: f64,
    /// Mean flat signal above the bias level.
    pub signal: f64,
}

/// Measured sensor parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorProfile {
    pub id: Uuid,
    pub session: String,
    pub camera_model: String,
    pub gain_setting: Option<i32>,
    #[serde(default)]
    pub offset: Option<i32>,
    #[serde(default)]
    pub binning: Option<String>,
    /// Electrons.
    pub read_noise: f64,
    /// Electrons per ADU.
    pub gain: f64,
    /// Electrons. An approximation; see the notes.
    pub full_well_capacity: u32,
    pub temperature: Option<f64>,
    pub measured_at: DateTime<Utc>,
    pub confidence: f64,
    pub stats: CharacterizationStats,
    #[serde(default)]
    pub notes: Vec<CharacterizationNote>,
}

impl SensorProfile {
    pub fn notes_text(&self) -> String {
        self.notes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn has_note(&self, predicate: impl Fn(&CharacterizationNote) -> bool) -> bool {
        self.notes.iter().any(predicate)
    }
}
