/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default sigma threshold for per-pixel sigma-clip rejection.
pub const DEFAULT_CLIP_SIGMA: f32 = 3.0;

/// Default cap on sigma-clip rejection passes.
pub const DEFAULT_CLIP_ITERATIONS: usize = 5;

/// A sigma-clip pass that would leave fewer survivors than this is not applied.
pub const MIN_CLIP_SURVIVORS: usize = 2;

/// Stacks smaller than this are never clipped (MinMax or SigmaClip).
pub const MIN_REJECTION_STACK: usize = 3;

/// Normal-distribution conversion from median absolute deviation to sigma.
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Sigma used for the per-frame clipped statistics during characterization.
pub const FRAME_STATS_SIGMA: f64 = 3.0;

/// Iterations for the per-frame clipped statistics during characterization.
pub const FRAME_STATS_ITERATIONS: usize = 5;

/// Variance (ADU^2) at or below which a difference image counts as degenerate.
pub const ZERO_VARIANCE_EPSILON: f64 = 1e-12;

/// Mean-level difference (ADU) below which a flat pair counts as too similar.
pub const FLAT_PAIR_EPSILON: f64 = 1e-3;

/// Gain (e-/ADU) reported when the photon-transfer estimate is undefined.
pub const FALLBACK_GAIN: f64 = 1.0;

/// Baseline confidence of a characterization before note penalties.
pub const BASE_CONFIDENCE: f64 = 0.8;

/// Confidence floor after penalties.
pub const MIN_CONFIDENCE: f64 = 0.1;

/// Two exposure times closer than this (seconds) are considered equal.
pub const EXPOSURE_TOLERANCE: f64 = 1e-6;

/// FITS logical record size in bytes.
pub const FITS_BLOCK_SIZE: usize = 2880;

/// FITS header card size in bytes.
pub const FITS_CARD_SIZE: usize = 80;

/// Name of the masters index file inside the masters directory.
pub const MASTERS_INDEX_FILE: &str = ".masters.json";

/// Directory (under processed data) that holds master frames.
pub const MASTERS_DIR: &str = "masters";

/// Directory (under processed data) that holds sensor profiles.
pub const PROFILES_DIR: &str = "profiles";

/// Directory (under raw data) that holds calibration sessions.
pub const CALIBRATION_DIR: &str = "calibration";

/// File extensions recognised as FITS.
pub const FITS_EXTENSIONS: [&str; 4] = ["fit", "fits", "FIT", "FITS"];

/// File extensions loaded through the `image` crate.
pub const RASTER_EXTENSIONS: [&str; 4] = ["tif", "tiff", "png", "PNG"];
