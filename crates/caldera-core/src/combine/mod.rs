pub mod minmax;
pub mod sigma_clip;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{CalderaError, Result};
use crate::stats::{mean, median_in_place};

use minmax::minmax_reject;
use sigma_clip::{sigma_clip, SigmaClipParams};

/// How surviving values of a pixel stack are reduced to one value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombineMethod {
    #[default]
    Median,
    Average,
}

impl CombineMethod {
    /// Short identifier written to FITS headers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Average => "average",
        }
    }
}

impl std::fmt::Display for CombineMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Average => write!(f, "Average"),
        }
    }
}

/// Per-pixel outlier rejection applied before combination.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum RejectionMethod {
    None,
    MinMax,
    SigmaClip(SigmaClipParams),
}

impl Default for RejectionMethod {
    fn default() -> Self {
        Self::SigmaClip(SigmaClipParams::default())
    }
}

impl RejectionMethod {
    /// Short identifier written to FITS headers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MinMax => "minmax",
            Self::SigmaClip(_) => "sigma_clip",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::SigmaClip(params) => params.validate(),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for RejectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::MinMax => write!(f, "Min/Max"),
            Self::SigmaClip(p) => write!(
                f,
                "Sigma Clip ({:.1}\u{03c3}, {} iter, {})",
                p.sigma, p.max_iterations, p.estimator
            ),
        }
    }
}

/// Output of a per-pixel combination.
#[derive(Clone, Debug)]
pub struct Combined {
    pub data: Array2<f32>,
    /// Total number of per-pixel values discarded by rejection.
    pub rejected_samples: u64,
}

/// Combine equally shaped arrays pixel by pixel.
///
/// Each pixel stack is rejected, then reduced with `method`. Rows run in
/// parallel for images >= 256x256. Shapes must already be validated.
pub fn combine_arrays(
    arrays: &[&Array2<f32>],
    method: CombineMethod,
    rejection: &RejectionMethod,
) -> Result<Combined> {
    if arrays.is_empty() {
        return Err(CalderaError::EmptySelection);
    }
    rejection.validate()?;

    let (h, w) = arrays[0].dim();
    let n = arrays.len();

    let rows: Vec<(Vec<f32>, u64)> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h)
            .into_par_iter()
            .map(|row| combine_row(arrays, row, w, method, rejection))
            .collect()
    } else {
        (0..h)
            .map(|row| combine_row(arrays, row, w, method, rejection))
            .collect()
    };

    let mut rejected_samples = 0u64;
    let mut pixels = Vec::with_capacity(h * w);
    for (row, rejected) in rows {
        pixels.extend_from_slice(&row);
        rejected_samples += rejected;
    }

    let data = Array2::from_shape_vec((h, w), pixels)
        .map_err(|e| CalderaError::InvalidRequest(format!("combined shape: {e}")))?;
    Ok(Combined {
        data,
        rejected_samples,
    })
}

fn combine_row(
    arrays: &[&Array2<f32>],
    row: usize,
    w: usize,
    method: CombineMethod,
    rejection: &RejectionMethod,
) -> (Vec<f32>, u64) {
    let n = arrays.len();
    let mut stack = vec![0.0f32; n];
    let mut scratch = Vec::with_capacity(n);
    let mut out = vec![0.0f32; w];
    let mut rejected = 0u64;

    for (col, result) in out.iter_mut().enumerate() {
        for (i, array) in arrays.iter().enumerate() {
            stack[i] = array[[row, col]];
        }
        let (value, kept) = combine_stack(&mut stack, method, rejection, &mut scratch);
        *result = value;
        rejected += (n - kept) as u64;
    }

    (out, rejected)
}

/// Reject and reduce a single pixel stack. Returns the combined value and the
/// number of surviving samples. `values` is reordered.
pub fn combine_stack(
    values: &mut [f32],
    method: CombineMethod,
    rejection: &RejectionMethod,
    scratch: &mut Vec<f32>,
) -> (f32, usize) {
    let kept = match rejection {
        RejectionMethod::None => values.len(),
        RejectionMethod::MinMax => minmax_reject(values),
        RejectionMethod::SigmaClip(params) => sigma_clip(values, params, scratch),
    };
    let survivors = &mut values[..kept];
    let value = match method {
        CombineMethod::Median => median_in_place(survivors),
        CombineMethod::Average => mean(survivors),
    };
    (value, kept)
}
