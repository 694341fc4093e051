use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CharacterizeConfig;
use crate::consts::{
    BASE_CONFIDENCE, FALLBACK_GAIN, FLAT_PAIR_EPSILON, FRAME_STATS_ITERATIONS, FRAME_STATS_SIGMA,
    MIN_CONFIDENCE, ZERO_VARIANCE_EPSILON,
};
use crate::error::{CalderaError, Result};
use crate::frame::{ensure_same_dimensions, FrameDescriptor, FrameKind, RawFrame};
use crate::io::loader::load_frames_with_progress;
use crate::progress::{NoOpReporter, ProgressReporter, Stage};
use crate::stats::{difference_stats, non_finite_count, sigma_clipped_stats, PixelStats};
use crate::store::{validate_session_name, CalibrationStore};

use super::{
    CharacterizationNote, CharacterizationRequest, CharacterizationStats, DifferencePair,
    SensorProfile, SensorSettings,
};

/// Measure read noise, gain and full-well capacity and persist the profile.
pub fn characterize(
    request: &CharacterizationRequest,
    store: &CalibrationStore,
    config: &CharacterizeConfig,
) -> Result<SensorProfile> {
    characterize_reported(request, store, config, &NoOpReporter)
}

/// [`characterize`] with progress reporting.
pub fn characterize_reported(
    request: &CharacterizationRequest,
    store: &CalibrationStore,
    config: &CharacterizeConfig,
    reporter: &dyn ProgressReporter,
) -> Result<SensorProfile> {
    validate_request(request)?;
    info!(
        session = %request.session,
        camera = %request.camera_model,
        gain_setting = ?request.gain_setting,
        "Characterizing sensor"
    );

    let descriptors = [
        request.bias[0].clone(),
        request.bias[1].clone(),
        request.flats[0].clone(),
        request.flats[1].clone(),
    ];
    reporter.begin_stage(Stage::Loading, Some(descriptors.len()));
    let frames = load_frames_with_progress(&descriptors, |done| reporter.advance(done))?;
    reporter.finish_stage();

    let [bias1, bias2, flat1, flat2] = frames.as_slice() else {
        return Err(CalderaError::InvalidRequest(format!(
            "expected 4 frames, loaded {}",
            frames.len()
        )));
    };

    reporter.begin_stage(Stage::Characterizing, None);
    let profile = characterize_frames(bias1, bias2, flat1, flat2, &request.settings(), config)?;
    reporter.finish_stage();

    reporter.begin_stage(Stage::Writing, None);
    let path = store.save_profile(&profile)?;
    reporter.finish_stage();

    info!(
        id = %profile.id,
        path = %path.display(),
        read_noise = profile.read_noise,
        gain = profile.gain,
        full_well = profile.full_well_capacity,
        confidence = profile.confidence,
        "Sensor profile saved"
    );
    Ok(profile)
}

/// Characterize already loaded frames without touching storage.
pub fn characterize_frames(
    bias1: &RawFrame,
    bias2: &RawFrame,
    flat1: &RawFrame,
    flat2: &RawFrame,
    settings: &SensorSettings,
    config: &CharacterizeConfig,
) -> Result<SensorProfile> {
    ensure_same_dimensions(&[bias1, bias2, flat1, flat2])?;

    let frame_stats: Vec<PixelStats> = [bias1, bias2, flat1, flat2]
        .par_iter()
        .map(|f| sigma_clipped_stats(&f.data, FRAME_STATS_SIGMA, FRAME_STATS_ITERATIONS))
        .collect();
    let (b1, b2, f1, f2) = (frame_stats[0], frame_stats[1], frame_stats[2], frame_stats[3]);

    let mut notes = Vec::new();
    let non_finite: usize = [bias1, bias2, flat1, flat2]
        .iter()
        .map(|f| non_finite_count(&f.data))
        .sum();
    if non_finite > 0 {
        notes.push(CharacterizationNote::NonFinitePixels { count: non_finite });
    }

    let bias_level = (b1.mean + b2.mean) / 2.0;

    // Read noise: the difference of two independent reads has twice the variance.
    let bias_diff = difference_stats(&bias1.data, &bias2.data);
    let read_noise_adu = if bias_diff.variance <= ZERO_VARIANCE_EPSILON {
        notes.push(CharacterizationNote::ZeroVariance {
            pair: DifferencePair::Bias,
        });
        0.0
    } else {
        bias_diff.std_dev() / std::f64::consts::SQRT_2
    };

    // Shot noise: half the flat-difference variance, less the read noise.
    let flat_diff = difference_stats(&flat1.data, &flat2.data);
    if flat_diff.variance <= ZERO_VARIANCE_EPSILON {
        notes.push(CharacterizationNote::ZeroVariance {
            pair: DifferencePair::Flat,
        });
    }
    let raw_shot_variance = flat_diff.variance / 2.0 - read_noise_adu * read_noise_adu;
    let shot_variance = if raw_shot_variance < 0.0 {
        notes.push(CharacterizationNote::NegativeShotVariance {
            variance: raw_shot_variance,
        });
        0.0
    } else {
        raw_shot_variance
    };

    let signal = (f1.mean + f2.mean) / 2.0 - bias_level;
    if signal <= 0.0 {
        notes.push(CharacterizationNote::NonPositiveSignal { signal });
    }

    let gain = if signal > 0.0 && shot_variance > ZERO_VARIANCE_EPSILON {
        signal / shot_variance
    } else {
        notes.push(CharacterizationNote::GainFallback {
            gain: FALLBACK_GAIN,
        });
        FALLBACK_GAIN
    };

    let read_noise = read_noise_adu * gain;

    let peak_signal = (f1.mean - bias_level).max(f2.mean - bias_level);
    let full_well_capacity = full_well_electrons(peak_signal, gain);
    notes.push(CharacterizationNote::FullWellApproximation);

    if (f1.mean - f2.mean).abs() < FLAT_PAIR_EPSILON {
        notes.push(CharacterizationNote::FlatPairTooSimilar);
    }

    let flat_level_percent = (f1.mean + f2.mean) / 2.0 / config.saturation_adu * 100.0;
    if !config.flat_level_percent.contains(flat_level_percent) {
        notes.push(CharacterizationNote::FlatLevelOutOfRange {
            percent: flat_level_percent,
        });
    }
    if !config.gain_range.contains(gain) {
        notes.push(CharacterizationNote::UnusualGain { gain });
    }
    if !config.read_noise_range.contains(read_noise) {
        notes.push(CharacterizationNote::UnusualReadNoise { read_noise });
    }

    let confidence = confidence(&notes);
    for note in &notes {
        match note {
            CharacterizationNote::FullWellApproximation => debug!("{note}"),
            _ => warn!(camera = %settings.camera_model, "{note}"),
        }
    }

    Ok(SensorProfile {
        id: Uuid::new_v4(),
        session: settings.session.clone(),
        camera_model: settings.camera_model.clone(),
        gain_setting: settings.gain_setting,
        offset: settings.offset,
        binning: settings.binning.clone(),
        read_noise,
        gain,
        full_well_capacity,
        temperature: settings.temperature,
        measured_at: Utc::now(),
        confidence,
        stats: CharacterizationStats {
            bias_means: [b1.mean, b2.mean],
            bias_std_devs: [b1.std_dev, b2.std_dev],
            bias_level,
            read_noise_adu,
            flat_means: [f1.mean, f2.mean],
            flat_std_devs: [f1.std_dev, f2.std_dev],
            flat_level_percent,
            flat_diff_variance: flat_diff.variance,
            shot_variance,
            signal,
        },
        notes,
    })
}

/// Coarse full-well estimate: peak flat signal converted to electrons.
/// Never below one electron.
fn full_well_electrons(peak_signal_adu: f64, gain: f64) -> u32 {
    let electrons = (peak_signal_adu * gain).round();
    if electrons.is_nan() || electrons < 1.0 {
        1
    } else if electrons >= u32::MAX as f64 {
        u32::MAX
    } else {
        electrons as u32
    }
}

fn confidence(notes: &[CharacterizationNote]) -> f64 {
    let penalty: f64 = notes.iter().map(CharacterizationNote::penalty).sum();
    (BASE_CONFIDENCE - penalty).clamp(MIN_CONFIDENCE, 1.0)
}

fn validate_request(request: &CharacterizationRequest) -> Result<()> {
    validate_session_name(&request.session)?;
    if request.camera_model.trim().is_empty() {
        return Err(CalderaError::InvalidRequest("camera model is empty".into()));
    }
    check_kinds(&request.bias, FrameKind::Bias)?;
    check_kinds(&request.flats, FrameKind::Flat)
}

fn check_kinds(descriptors: &[FrameDescriptor], expected: FrameKind) -> Result<()> {
    match descriptors.iter().find(|d| d.kind != expected) {
        Some(d) => Err(CalderaError::KindMismatch {
            path: d.path.clone(),
            expected,
            found: d.kind,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_well_is_at_least_one_electron() {
        assert_eq!(full_well_electrons(-50.0, 1.0), 1);
        assert_eq!(full_well_electrons(0.2, 1.0), 1);
        assert_eq!(full_well_electrons(f64::NAN, 1.0), 1);
        assert_eq!(full_well_electrons(30_000.0, 1.5), 45_000);
    }

    #[test]
    fn confidence_is_clamped() {
        assert!((confidence(&[CharacterizationNote::FullWellApproximation]) - 0.8).abs() < 1e-12);
        let many = vec![CharacterizationNote::UnusualGain { gain: 50.0 }; 10];
        assert_eq!(confidence(&many), MIN_CONFIDENCE);
    }
}
