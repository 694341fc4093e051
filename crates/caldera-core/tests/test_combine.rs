mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use caldera_core::combine::sigma_clip::{ClipEstimator, SigmaClipParams};
use caldera_core::combine::{combine_arrays, combine_stack, CombineMethod, RejectionMethod};
use caldera_core::error::CalderaError;

use common::{constant, noisy};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stack_of(values: &[f32]) -> Vec<Array2<f32>> {
    values.iter().map(|&v| constant(4, 4, v)).collect()
}

fn combine(values: &[f32], method: CombineMethod, rejection: RejectionMethod) -> (f32, u64) {
    let arrays = stack_of(values);
    let refs: Vec<_> = arrays.iter().collect();
    let out = combine_arrays(&refs, method, &rejection).unwrap();
    let first = out.data[[0, 0]];
    assert!(out.data.iter().all(|&v| v == first));
    (first, out.rejected_samples / 16)
}

// ---------------------------------------------------------------------------
// Median / Average without rejection
// ---------------------------------------------------------------------------

#[test]
fn test_median_of_three() {
    let (v, rejected) = combine(&[1.0, 5.0, 9.0], CombineMethod::Median, RejectionMethod::None);
    assert_eq!(v, 5.0);
    assert_eq!(rejected, 0);
}

#[test]
fn test_average_of_three() {
    let (v, _) = combine(&[1.0, 5.0, 9.0], CombineMethod::Average, RejectionMethod::None);
    assert_eq!(v, 5.0);
}

#[test]
fn test_median_even_count_averages_middle_pair() {
    let (v, _) = combine(&[2.0, 10.0, 4.0, 8.0], CombineMethod::Median, RejectionMethod::None);
    assert_eq!(v, 6.0);
}

#[test]
fn test_single_frame_passes_through() {
    let (v, rejected) = combine(&[42.0], CombineMethod::Median, RejectionMethod::default());
    assert_eq!(v, 42.0);
    assert_eq!(rejected, 0);
}

#[test]
fn test_empty_input_is_error() {
    let err = combine_arrays(&[], CombineMethod::Median, &RejectionMethod::None).unwrap_err();
    assert!(matches!(err, CalderaError::EmptySelection));
}

// ---------------------------------------------------------------------------
// MinMax
// ---------------------------------------------------------------------------

#[test]
fn test_minmax_two_frames_keeps_both() {
    let (median, rejected) = combine(&[4.0, 8.0], CombineMethod::Median, RejectionMethod::MinMax);
    assert_eq!(median, 6.0);
    assert_eq!(rejected, 0);

    let (mean, _) = combine(&[4.0, 8.0], CombineMethod::Average, RejectionMethod::MinMax);
    assert_eq!(mean, 6.0);
}

#[test]
fn test_minmax_drops_one_min_and_one_max() {
    let (mean, rejected) = combine(
        &[1.0, 2.0, 3.0, 4.0, 100.0],
        CombineMethod::Average,
        RejectionMethod::MinMax,
    );
    assert_eq!(mean, 3.0);
    assert_eq!(rejected, 2);
}

#[test]
fn test_minmax_three_frames_keeps_middle() {
    let (mean, rejected) = combine(&[7.0, 1.0, 3.0], CombineMethod::Average, RejectionMethod::MinMax);
    assert_eq!(mean, 3.0);
    assert_eq!(rejected, 2);
}

// ---------------------------------------------------------------------------
// Sigma clipping
// ---------------------------------------------------------------------------

#[test]
fn test_sigma_clip_median_ignores_strong_outlier() {
    let (v, _) = combine(
        &[10.0, 10.0, 10.0, 10.0, 1000.0],
        CombineMethod::Median,
        RejectionMethod::default(),
    );
    assert_abs_diff_eq!(v, 10.0, epsilon = 1e-4);
}

#[test]
fn test_sigma_clip_mean_rejects_outlier_in_deep_stack() {
    let mut values = vec![100.0f32; 11];
    values.push(1000.0);
    let (v, rejected) = combine(&values, CombineMethod::Average, RejectionMethod::default());
    assert_abs_diff_eq!(v, 100.0, epsilon = 1e-4);
    assert_eq!(rejected, 1);
}

#[test]
fn test_sigma_clip_median_mad_rejects_outlier_in_short_stack() {
    let rejection = RejectionMethod::SigmaClip(SigmaClipParams {
        estimator: ClipEstimator::MedianMad,
        ..SigmaClipParams::default()
    });
    let (v, rejected) = combine(
        &[9.0, 10.0, 10.0, 11.0, 1000.0],
        CombineMethod::Average,
        rejection,
    );
    assert_abs_diff_eq!(v, 10.0, epsilon = 1e-4);
    assert_eq!(rejected, 1);
}

#[test]
fn test_sigma_clip_two_frames_untouched() {
    let (v, rejected) = combine(&[10.0, 1000.0], CombineMethod::Average, RejectionMethod::default());
    assert_eq!(v, 505.0);
    assert_eq!(rejected, 0);
}

#[test]
fn test_sigma_clip_keeps_at_least_two() {
    let rejection = RejectionMethod::SigmaClip(SigmaClipParams {
        sigma: 0.01,
        max_iterations: 100,
        estimator: ClipEstimator::MeanStdDev,
    });
    let mut values = [1.0f32, 2.0, 3.0, 50.0, 51.0, 400.0];
    let (_, kept) = combine_stack(&mut values, CombineMethod::Average, &rejection, &mut Vec::new());
    assert!(kept >= 2, "kept {kept}");
}

#[test]
fn test_invalid_sigma_rejected() {
    let arrays = stack_of(&[1.0, 2.0, 3.0]);
    let refs: Vec<_> = arrays.iter().collect();
    for params in [
        SigmaClipParams {
            sigma: 0.0,
            ..SigmaClipParams::default()
        },
        SigmaClipParams {
            sigma: -1.0,
            ..SigmaClipParams::default()
        },
        SigmaClipParams {
            max_iterations: 0,
            ..SigmaClipParams::default()
        },
    ] {
        let err = combine_arrays(&refs, CombineMethod::Median, &RejectionMethod::SigmaClip(params))
            .unwrap_err();
        assert!(matches!(err, CalderaError::InvalidRequest(_)), "{err}");
    }
}

// ---------------------------------------------------------------------------
// Parallel path (>= 256x256) agrees with per-pixel evaluation
// ---------------------------------------------------------------------------

#[test]
fn test_parallel_rows_match_single_stack() {
    let arrays: Vec<_> = (0..5).map(|i| noisy(256, 256, 100.0, 5.0, i + 1)).collect();
    let refs: Vec<_> = arrays.iter().collect();
    let rejection = RejectionMethod::default();
    let out = combine_arrays(&refs, CombineMethod::Average, &rejection).unwrap();

    let mut scratch = Vec::new();
    for &(r, c) in &[(0, 0), (17, 203), (128, 128), (255, 255)] {
        let mut stack: Vec<f32> = arrays.iter().map(|a| a[[r, c]]).collect();
        let (expected, _) = combine_stack(&mut stack, CombineMethod::Average, &rejection, &mut scratch);
        assert_eq!(out.data[[r, c]], expected);
    }
}
