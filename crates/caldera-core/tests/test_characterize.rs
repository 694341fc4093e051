mod common;

use approx::assert_relative_eq;

use caldera_core::characterize::{
    characterize, characterize_frames, CharacterizationNote, CharacterizationRequest,
    DifferencePair, SensorSettings,
};
use caldera_core::config::CharacterizeConfig;
use caldera_core::error::CalderaError;
use caldera_core::frame::{FrameDescriptor, RawFrame};

use common::{constant, files_under, frame_on_disk, noisy, raw_frame, store_in};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const N: usize = 256;
const BIAS: f64 = 500.0;
const READ_NOISE_ADU: f64 = 5.0;
const GAIN: f64 = 2.0;

fn settings() -> SensorSettings {
    SensorSettings {
        session: "s1".into(),
        camera_model: "ASI2600MM".into(),
        gain_setting: Some(100),
        offset: Some(50),
        binning: Some("1x1".into()),
        temperature: Some(-10.0),
    }
}

fn bias(seed: u64, std_dev: f64) -> RawFrame {
    raw_frame(
        FrameDescriptor::bias(format!("bias_{seed}.fits")),
        noisy(N, N, BIAS, std_dev, seed),
    )
}

/// Flat with Poisson-like shot noise for `GAIN` plus read noise.
fn flat(seed: u64, signal_adu: f64) -> RawFrame {
    let shot_var = signal_adu / GAIN;
    let std_dev = (shot_var + READ_NOISE_ADU * READ_NOISE_ADU).sqrt();
    raw_frame(
        FrameDescriptor::flat(format!("flat_{seed}.fits"), 1.0, None),
        noisy(N, N, BIAS + signal_adu, std_dev, seed),
    )
}

fn has(notes: &[CharacterizationNote], f: impl Fn(&CharacterizationNote) -> bool) -> bool {
    notes.iter().any(f)
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

#[test]
fn test_recovers_known_gain_and_read_noise() {
    let b1 = bias(1, READ_NOISE_ADU);
    let b2 = bias(2, READ_NOISE_ADU);
    let f1 = flat(3, 20_000.0);
    let f2 = flat(4, 20_100.0);

    let profile =
        characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
            .unwrap();

    assert_relative_eq!(profile.gain, GAIN, max_relative = 0.03);
    assert_relative_eq!(profile.read_noise, READ_NOISE_ADU * GAIN, max_relative = 0.05);
    assert_relative_eq!(profile.stats.read_noise_adu, READ_NOISE_ADU, max_relative = 0.03);
    assert_relative_eq!(profile.stats.bias_level, BIAS, max_relative = 0.001);
    assert_relative_eq!(
        profile.full_well_capacity as f64,
        20_100.0 * GAIN,
        max_relative = 0.05
    );

    assert_eq!(profile.notes, vec![CharacterizationNote::FullWellApproximation]);
    assert_relative_eq!(profile.confidence, 0.8);
    assert_eq!(profile.camera_model, "ASI2600MM");
    assert_eq!(profile.gain_setting, Some(100));
    assert_eq!(profile.offset, Some(50));
    assert_eq!(profile.binning.as_deref(), Some("1x1"));
    assert_eq!(profile.temperature, Some(-10.0));
}

#[test]
fn test_nan_pixel_left_out_and_noted() {
    let mut b1 = bias(1, READ_NOISE_ADU);
    b1.data[[3, 3]] = f32::NAN;
    let b2 = bias(2, READ_NOISE_ADU);
    let f1 = flat(3, 20_000.0);
    let f2 = flat(4, 20_100.0);

    let profile =
        characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
            .unwrap();

    assert_relative_eq!(profile.stats.bias_means[0], BIAS, max_relative = 0.001);
    assert_relative_eq!(profile.stats.read_noise_adu, READ_NOISE_ADU, max_relative = 0.03);
    assert_relative_eq!(profile.gain, GAIN, max_relative = 0.03);
    assert!(profile.read_noise.is_finite());
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::NonFinitePixels { count: 1 }
    )));
    assert!(!has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::UnusualReadNoise { .. } | CharacterizationNote::ZeroVariance { .. }
    )));
    assert_relative_eq!(profile.confidence, 0.7, epsilon = 1e-12);
}

#[test]
fn test_identical_frames_degrade_to_notes() {
    let b = bias(7, READ_NOISE_ADU);
    let f = flat(8, 30_000.0);

    let profile =
        characterize_frames(&b, &b, &f, &f, &settings(), &CharacterizeConfig::default()).unwrap();

    assert!(!profile.notes.is_empty());
    assert!(profile.notes_text().contains("zero variance"));
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::ZeroVariance {
            pair: DifferencePair::Bias
        }
    )));
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::ZeroVariance {
            pair: DifferencePair::Flat
        }
    )));
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::FlatPairTooSimilar
    )));
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::GainFallback { .. }
    )));

    assert_eq!(profile.gain, 1.0);
    assert_eq!(profile.read_noise, 0.0);
    assert!(profile.full_well_capacity >= 1);
    assert!(profile.gain.is_finite() && profile.read_noise.is_finite());
    assert!(profile.confidence >= 0.1 && profile.confidence <= 1.0);
}

#[test]
fn test_negative_shot_variance_clamped() {
    let b1 = bias(11, 20.0);
    let b2 = bias(12, 20.0);
    // Flats far quieter than the bias pair
    let f1 = raw_frame(
        FrameDescriptor::flat("f1.fits", 1.0, None),
        noisy(N, N, 30_000.0, 5.0, 13),
    );
    let f2 = raw_frame(
        FrameDescriptor::flat("f2.fits", 1.0, None),
        noisy(N, N, 30_010.0, 5.0, 14),
    );

    let profile =
        characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
            .unwrap();

    assert_eq!(profile.stats.shot_variance, 0.0);
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::NegativeShotVariance { variance } if *variance < 0.0
    )));
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::GainFallback { gain } if *gain == 1.0
    )));
    assert_eq!(profile.gain, 1.0);
}

#[test]
fn test_flats_below_bias_noted() {
    let b1 = bias(21, READ_NOISE_ADU);
    let b2 = bias(22, READ_NOISE_ADU);
    let f1 = raw_frame(
        FrameDescriptor::flat("f1.fits", 1.0, None),
        noisy(N, N, 400.0, 10.0, 23),
    );
    let f2 = raw_frame(
        FrameDescriptor::flat("f2.fits", 1.0, None),
        noisy(N, N, 420.0, 10.0, 24),
    );

    let profile =
        characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
            .unwrap();
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::NonPositiveSignal { .. }
    )));
    assert_eq!(profile.gain, 1.0);
    assert_eq!(profile.full_well_capacity, 1);
}

#[test]
fn test_flat_level_checked_against_saturation() {
    let b1 = bias(31, READ_NOISE_ADU);
    let b2 = bias(32, READ_NOISE_ADU);
    let f1 = flat(33, 1_500.0);
    let f2 = flat(34, 1_600.0);

    let profile =
        characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
            .unwrap();
    assert!(has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::FlatLevelOutOfRange { percent } if *percent < 30.0
    )));

    // A 12-bit sensor saturates at 4095, which puts the same flats mid-range.
    let config = CharacterizeConfig {
        saturation_adu: 4095.0,
        ..CharacterizeConfig::default()
    };
    let profile = characterize_frames(&b1, &b2, &f1, &f2, &settings(), &config).unwrap();
    assert!(!has(&profile.notes, |n| matches!(
        n,
        CharacterizationNote::FlatLevelOutOfRange { .. }
    )));
}

#[test]
fn test_dimension_mismatch_is_fatal() {
    let b1 = bias(41, READ_NOISE_ADU);
    let b2 = bias(42, READ_NOISE_ADU);
    let f1 = flat(43, 20_000.0);
    let f2 = raw_frame(
        FrameDescriptor::flat("small.fits", 1.0, None),
        constant(N, N - 1, 20_000.0),
    );

    let err = characterize_frames(&b1, &b2, &f1, &f2, &settings(), &CharacterizeConfig::default())
        .unwrap_err();
    assert!(matches!(err, CalderaError::DimensionMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn request_on_disk(root: &std::path::Path, flat_width: usize) -> CharacterizationRequest {
    let raw = root.join("raw");
    let b1 = frame_on_disk(&raw, "b1.fits", &noisy(64, 64, BIAS, 5.0, 51), FrameDescriptor::bias(""));
    let b2 = frame_on_disk(&raw, "b2.fits", &noisy(64, 64, BIAS, 5.0, 52), FrameDescriptor::bias(""));
    let f1 = frame_on_disk(
        &raw,
        "f1.fits",
        &noisy(64, 64, 25_000.0, 110.0, 53),
        FrameDescriptor::flat("", 1.0, None),
    );
    let f2 = frame_on_disk(
        &raw,
        "f2.fits",
        &noisy(64, flat_width, 25_100.0, 110.0, 54),
        FrameDescriptor::flat("", 1.0, None),
    );
    CharacterizationRequest {
        session: "s1".into(),
        camera_model: "ASI2600MM".into(),
        gain_setting: Some(100),
        offset: None,
        binning: None,
        temperature: None,
        bias: [b1, b2],
        flats: [f1, f2],
    }
}

#[test]
fn test_characterize_persists_profile() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let request = request_on_disk(dir.path(), 64);

    let profile = characterize(&request, &store, &CharacterizeConfig::default()).unwrap();

    let path = store
        .layout()
        .profile_path("s1", "ASI2600MM", Some(100));
    assert!(path.ends_with("profiles/s1/sensor_ASI2600MM_gain100.json"));
    assert!(path.exists());

    let listed = store.list_profiles("s1").unwrap();
    assert_eq!(listed, vec![profile]);
    assert!(store.list_profiles("s2").unwrap().is_empty());
}

#[test]
fn test_similar_camera_names_keep_separate_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let b1 = bias(61, READ_NOISE_ADU);
    let b2 = bias(62, READ_NOISE_ADU);
    let f1 = flat(63, 20_000.0);
    let f2 = flat(64, 20_100.0);

    let mut paths = Vec::new();
    for camera in ["ASI 2600", "ASI-2600"] {
        let settings = SensorSettings {
            camera_model: camera.into(),
            ..settings()
        };
        let profile =
            characterize_frames(&b1, &b2, &f1, &f2, &settings, &CharacterizeConfig::default())
                .unwrap();
        paths.push(store.save_profile(&profile).unwrap());
    }
    assert_ne!(paths[0], paths[1]);

    let mut cameras: Vec<_> = store
        .list_profiles("s1")
        .unwrap()
        .into_iter()
        .map(|p| p.camera_model)
        .collect();
    cameras.sort();
    assert_eq!(cameras, vec!["ASI 2600".to_string(), "ASI-2600".to_string()]);
}

#[test]
fn test_characterize_mismatch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let request = request_on_disk(dir.path(), 63);

    let err = characterize(&request, &store, &CharacterizeConfig::default()).unwrap_err();
    assert!(matches!(err, CalderaError::DimensionMismatch { .. }));
    assert!(files_under(&store.layout().processed_data).is_empty());
}

#[test]
fn test_characterize_rejects_wrong_kind() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(dir.path());
    let mut request = request_on_disk(dir.path(), 64);
    request.bias[1] = request.flats[0].clone();

    let err = characterize(&request, &store, &CharacterizeConfig::default()).unwrap_err();
    assert!(matches!(err, CalderaError::KindMismatch { .. }));
}
