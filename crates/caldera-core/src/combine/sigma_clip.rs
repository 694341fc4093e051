use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_CLIP_ITERATIONS, DEFAULT_CLIP_SIGMA, MAD_TO_SIGMA, MIN_CLIP_SURVIVORS,
    MIN_REJECTION_STACK,
};
use crate::error::{CalderaError, Result};
use crate::stats::{mad, mean_std_dev, median_in_place};

/// Centre/spread estimator used by sigma clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipEstimator {
    /// Mean and population standard deviation of the surviving values.
    #[default]
    MeanStdDev,
    /// Median and 1.4826 x median absolute deviation.
    MedianMad,
}

impl std::fmt::Display for ClipEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MeanStdDev => write!(f, "mean/stddev"),
            Self::MedianMad => write!(f, "median/MAD"),
        }
    }
}

/// Parameters for per-pixel sigma-clip rejection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Values farther than `sigma` spreads from the centre are rejected (default: 3.0).
    pub sigma: f32,
    /// Maximum number of rejection passes (default: 5).
    pub max_iterations: usize,
    pub estimator: ClipEstimator,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_CLIP_SIGMA,
            max_iterations: DEFAULT_CLIP_ITERATIONS,
            estimator: ClipEstimator::default(),
        }
    }
}

impl SigmaClipParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(CalderaError::InvalidRequest(format!(
                "sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.max_iterations == 0 {
            return Err(CalderaError::InvalidRequest(
                "sigma clipping needs at least one iteration".into(),
            ));
        }
        Ok(())
    }
}

/// Iteratively sigma-clip a pixel stack in place.
///
/// Survivors are moved to the front; the return value is their count. A pass
/// that would leave fewer than two values is not applied, and stacks smaller
/// than three are returned untouched.
pub fn sigma_clip(values: &mut [f32], params: &SigmaClipParams, scratch: &mut Vec<f32>) -> usize {
    let mut len = values.len();
    if len < MIN_REJECTION_STACK {
        return len;
    }

    let sigma = params.sigma as f64;
    for _ in 0..params.max_iterations {
        let (centre, spread) = match params.estimator {
            ClipEstimator::MeanStdDev => mean_std_dev(&values[..len]),
            ClipEstimator::MedianMad => {
                let median = median_in_place(&mut values[..len]);
                let spread = mad(&values[..len], median, scratch) as f64 * MAD_TO_SIGMA;
                (median as f64, spread)
            }
        };
        if spread <= 0.0 {
            break;
        }

        let limit = sigma * spread;
        let keep = |v: f32| (v as f64 - centre).abs() <= limit;
        let survivors = values[..len].iter().filter(|&&v| keep(v)).count();
        if survivors == len || survivors < MIN_CLIP_SURVIVORS {
            break;
        }

        let mut write = 0;
        for read in 0..len {
            if keep(values[read]) {
                values.swap(write, read);
                write += 1;
            }
        }
        len = write;
    }

    len
}
