#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use caldera_core::frame::{FrameDescriptor, FrameKind, RawFrame};
use caldera_core::io::fits::{write_fits, FitsHeader, FitsValue};
use caldera_core::store::{CalibrationStore, StoreLayout};
use ndarray::Array2;

/// Deterministic xorshift generator with Gaussian sampling, so synthetic
/// frames are reproducible across runs.
pub struct Noise {
    state: u64,
    spare: Option<f64>,
}

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1,
            spare: None,
        }
    }

    /// Uniform in (0, 1].
    pub fn uniform(&mut self) -> f64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        ((self.state >> 11) as f64 + 1.0) / (1u64 << 53) as f64
    }

    /// Box-Muller normal deviate.
    pub fn gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        if let Some(z) = self.spare.take() {
            return mean + std_dev * z;
        }
        let u1 = self.uniform();
        let u2 = self.uniform();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(r * theta.sin());
        mean + std_dev * r * theta.cos()
    }
}

pub fn constant(h: usize, w: usize, value: f32) -> Array2<f32> {
    Array2::from_elem((h, w), value)
}

pub fn noisy(h: usize, w: usize, mean: f64, std_dev: f64, seed: u64) -> Array2<f32> {
    let mut noise = Noise::new(seed);
    Array2::from_shape_fn((h, w), |_| noise.gaussian(mean, std_dev) as f32)
}

pub fn raw_frame(descriptor: FrameDescriptor, data: Array2<f32>) -> RawFrame {
    RawFrame::new(descriptor, data, 16)
}

pub fn dark(name: &str, exposure: f64, gain: i32) -> FrameDescriptor {
    FrameDescriptor::dark(name, exposure).with_gain(Some(gain))
}

/// Write `data` as a FITS file carrying the descriptor's metadata.
pub fn write_frame(path: &Path, data: &Array2<f32>, descriptor: &FrameDescriptor) {
    let mut header = FitsHeader::new();
    let imagetyp = match descriptor.kind {
        FrameKind::Bias => "Bias Frame",
        FrameKind::Dark => "Dark Frame",
        FrameKind::Flat => "Flat Field",
    };
    header.set("IMAGETYP", FitsValue::Text(imagetyp.into()), None);
    if descriptor.kind != FrameKind::Bias {
        header.set("EXPTIME", FitsValue::Float(descriptor.exposure_time), None);
    }
    if let Some(g) = descriptor.gain {
        header.set("GAIN", FitsValue::Integer(g as i64), None);
    }
    if let Some(ref f) = descriptor.filter {
        header.set("FILTER", FitsValue::Text(f.clone()), None);
    }
    write_fits(path, data, &header).unwrap();
}

/// Write `data` to `dir/name` and return a descriptor pointing at it.
pub fn frame_on_disk(
    dir: &Path,
    name: &str,
    data: &Array2<f32>,
    template: FrameDescriptor,
) -> FrameDescriptor {
    let path = dir.join(name);
    let descriptor = FrameDescriptor { path, ..template };
    write_frame(&descriptor.path, data, &descriptor);
    descriptor
}

pub fn store_in(root: &Path) -> CalibrationStore {
    CalibrationStore::new(StoreLayout::new(
        root.join("01_raw_data"),
        root.join("02_processed_data"),
    ))
}

/// Every regular file below `dir`, sorted. Missing directories are empty.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return out;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(files_under(&path));
        } else {
            out.push(path);
        }
    }
    out.sort();
    out
}
