use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};

/// Summary statistics of a pixel array (ADU).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl PixelStats {
    /// Statistics over the finite pixels of `data`.
    pub fn of(data: &Array2<f32>) -> Self {
        let mut values = finite_values(data);
        Self::of_values(&mut values)
    }

    /// Statistics over a slice. Reorders `values`.
    pub fn of_values(values: &mut [f32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let (mean, std_dev) = mean_std_dev(values);
        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let median = median_in_place(values) as f64;
        Self {
            mean,
            median,
            std_dev,
            min: min as f64,
            max: max as f64,
        }
    }
}

/// Pixels that are neither NaN nor infinite, in row-major order.
pub fn finite_values(data: &Array2<f32>) -> Vec<f32> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Number of NaN or infinite pixels.
pub fn non_finite_count(data: &Array2<f32>) -> usize {
    data.iter().filter(|v| !v.is_finite()).count()
}

/// Population mean and standard deviation, accumulated in f64.
pub fn mean_std_dev(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Arithmetic mean, accumulated in f64.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}

/// Median via `select_nth_unstable` (O(n), no full sort). Reorders `values`.
///
/// Even counts average the two middle values. Empty input yields 0.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 0 {
        0.0
    } else if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        // After partitioning, the lower half holds everything <= values[mid];
        // its maximum is the other middle element.
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        ((lower as f64 + values[mid] as f64) / 2.0) as f32
    }
}

/// Median absolute deviation of `values` around `centre`.
pub fn mad(values: &[f32], centre: f32, scratch: &mut Vec<f32>) -> f32 {
    scratch.clear();
    scratch.extend(values.iter().map(|&v| (v - centre).abs()));
    median_in_place(scratch)
}

/// Mean, median and standard deviation of the finite pixels of `data` after
/// iterative mean-centred clipping at `sigma` standard deviations.
///
/// Stops when a pass rejects nothing, the spread is zero, or after
/// `iterations` passes. A pass that would reject every value is discarded.
/// Used to estimate frame levels robustly against hot pixels and cosmic rays.
pub fn sigma_clipped_stats(data: &Array2<f32>, sigma: f64, iterations: usize) -> PixelStats {
    let mut values = finite_values(data);
    if values.is_empty() {
        return PixelStats::default();
    }

    for _ in 0..iterations {
        let (mean, std_dev) = mean_std_dev(&values);
        if std_dev <= 0.0 {
            break;
        }
        let lo = mean - sigma * std_dev;
        let hi = mean + sigma * std_dev;
        let survivors: Vec<f32> = values
            .iter()
            .copied()
            .filter(|&v| (v as f64) >= lo && (v as f64) <= hi)
            .collect();
        if survivors.is_empty() || survivors.len() == values.len() {
            break;
        }
        values = survivors;
    }

    PixelStats::of_values(&mut values)
}

/// Mean and population variance of the pixel-wise difference `a - b`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DifferenceStats {
    pub mean: f64,
    pub variance: f64,
    /// Pixel pairs used. Pairs with a non-finite value on either side are
    /// skipped.
    pub samples: usize,
}

impl DifferenceStats {
    pub fn std_dev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// Statistics of the difference image of two equally shaped arrays.
///
/// Callers must check dimensions first; mismatched shapes panic inside
/// `Zip`.
pub fn difference_stats(a: &Array2<f32>, b: &Array2<f32>) -> DifferenceStats {
    let mut n = 0usize;
    let mut sum = 0.0f64;
    Zip::from(a).and(b).for_each(|&x, &y| {
        if x.is_finite() && y.is_finite() {
            sum += x as f64 - y as f64;
            n += 1;
        }
    });
    if n == 0 {
        return DifferenceStats::default();
    }
    let mean = sum / n as f64;

    let mut var_sum = 0.0f64;
    Zip::from(a).and(b).for_each(|&x, &y| {
        if x.is_finite() && y.is_finite() {
            let d = x as f64 - y as f64 - mean;
            var_sum += d * d;
        }
    });

    DifferenceStats {
        mean,
        variance: var_sum / n as f64,
        samples: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median_in_place(&mut [9.0, 1.0, 5.0]), 5.0);
        assert_eq!(median_in_place(&mut [0.9, 0.1, 0.7, 0.3]), 0.5);
        assert_eq!(median_in_place(&mut [4.0]), 4.0);
        assert_eq!(median_in_place(&mut []), 0.0);
    }

    #[test]
    fn mad_of_constant_is_zero() {
        let mut scratch = Vec::new();
        assert_eq!(mad(&[3.0, 3.0, 3.0], 3.0, &mut scratch), 0.0);
    }

    #[test]
    fn difference_of_identical_arrays_is_zero() {
        let a = Array2::from_elem((4, 4), 7.0f32);
        let d = difference_stats(&a, &a);
        assert_eq!(d.mean, 0.0);
        assert_eq!(d.variance, 0.0);
    }

    #[test]
    fn clipped_stats_ignore_single_hot_pixel() {
        let mut data = Array2::from_elem((32, 32), 100.0f32);
        data[[0, 0]] = 99.0;
        data[[0, 1]] = 101.0;
        data[[5, 5]] = 60_000.0;
        let stats = sigma_clipped_stats(&data, 3.0, 5);
        assert!((stats.mean - 100.0).abs() < 1e-6, "mean {}", stats.mean);
        assert!(stats.max < 200.0);
    }

    #[test]
    fn non_finite_pixels_are_ignored() {
        let mut data = Array2::from_elem((16, 16), 500.0f32);
        data[[0, 1]] = 498.0;
        data[[0, 2]] = 502.0;
        data[[3, 3]] = f32::NAN;
        data[[4, 4]] = f32::INFINITY;
        assert_eq!(non_finite_count(&data), 2);

        let stats = sigma_clipped_stats(&data, 3.0, 5);
        assert!((stats.mean - 500.0).abs() < 1e-6, "mean {}", stats.mean);
        assert!(stats.std_dev.is_finite());

        let other = Array2::from_elem((16, 16), 400.0f32);
        let d = difference_stats(&data, &other);
        assert_eq!(d.samples, 254);
        assert!((d.mean - 100.0).abs() < 1e-9);
        assert!(d.variance > 0.0 && d.variance.is_finite());
    }

    #[test]
    fn all_non_finite_yields_defaults() {
        let data = Array2::from_elem((4, 4), f32::NAN);
        assert_eq!(sigma_clipped_stats(&data, 3.0, 5), PixelStats::default());
        assert_eq!(difference_stats(&data, &data), DifferenceStats::default());
    }
}
