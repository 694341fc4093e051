use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::combine::{CombineMethod, RejectionMethod};
use crate::error::{CalderaError, Result};
use crate::store::StoreLayout;

/// Top-level configuration, usually read from `caldera.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalderaConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub combine: CombineConfig,
    #[serde(default)]
    pub characterize: CharacterizeConfig,
}

impl CalderaConfig {
    /// Read a TOML file. Missing sections and fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| CalderaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CalderaError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.combine
            .rejection
            .validate()
            .map_err(|e| CalderaError::Config(e.to_string()))?;
        self.characterize.validate()
    }

    /// Store layout rooted at `project_root`. Absolute data paths are kept
    /// as they are.
    pub fn layout(&self, project_root: &Path) -> StoreLayout {
        StoreLayout::new(
            project_root.join(&self.store.raw_data),
            project_root.join(&self.store.processed_data),
        )
    }
}

/// Locations of raw and processed data, relative to the project root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub raw_data: PathBuf,
    pub processed_data: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("01_raw_data"),
            processed_data: PathBuf::from("02_processed_data"),
        }
    }
}

/// Defaults applied to combination requests that do not choose a policy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub method: CombineMethod,
    pub rejection: RejectionMethod,
}

/// Inclusive range of plausible values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Thresholds for the advisory checks run after sensor characterization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterizeConfig {
    /// ADU value treated as full scale when judging flat exposure level.
    pub saturation_adu: f64,
    /// Acceptable flat level, in percent of `saturation_adu`.
    pub flat_level_percent: Bounds,
    /// Plausible gain, e-/ADU.
    pub gain_range: Bounds,
    /// Plausible read noise, e-.
    pub read_noise_range: Bounds,
}

impl Default for CharacterizeConfig {
    fn default() -> Self {
        Self {
            saturation_adu: 65_535.0,
            flat_level_percent: Bounds::new(30.0, 70.0),
            gain_range: Bounds::new(0.1, 10.0),
            read_noise_range: Bounds::new(0.5, 20.0),
        }
    }
}

impl CharacterizeConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.saturation_adu.is_finite() && self.saturation_adu > 0.0) {
            return Err(CalderaError::Config(format!(
                "saturation_adu must be positive, got {}",
                self.saturation_adu
            )));
        }
        for (name, bounds) in [
            ("flat_level_percent", self.flat_level_percent),
            ("gain_range", self.gain_range),
            ("read_noise_range", self.read_noise_range),
        ] {
            let ordered = bounds.min <= bounds.max;
            if !ordered {
                return Err(CalderaError::Config(format!(
                    "{name}: min {} exceeds max {}",
                    bounds.min, bounds.max
                )));
            }
        }
        Ok(())
    }
}
