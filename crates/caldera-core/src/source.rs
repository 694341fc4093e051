use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::frame::{FrameDescriptor, FrameKind};
use crate::io::fits::read_fits_header;
use crate::io::loader::{is_fits, is_supported};
use crate::store::{validate_session_name, StoreLayout};

/// Supplies the raw frames of one kind recorded in a session.
pub trait FrameSource {
    fn frames(&self, session: &str, kind: FrameKind) -> Result<Vec<FrameDescriptor>>;
}

/// Scans `{raw_data}/calibration/{session}/{bias|darks|flats}`.
///
/// Acquisition metadata comes from FITS headers (`EXPTIME` or `EXPOSURE`,
/// `GAIN`, `FILTER`). Raster files carry no metadata, so only bias frames
/// are usable in that form.
#[derive(Clone, Debug)]
pub struct DirectoryFrameSource {
    layout: StoreLayout,
}

impl DirectoryFrameSource {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    fn describe(&self, path: PathBuf, kind: FrameKind) -> Option<FrameDescriptor> {
        let (exposure, gain, filter) = if is_fits(&path) {
            match read_fits_header(&path) {
                Ok(h) => (
                    h.first_f64(&["EXPTIME", "EXPOSURE"]),
                    h.get_i64("GAIN").and_then(|g| i32::try_from(g).ok()),
                    h.get_str("FILTER").map(|s| s.trim().to_string()),
                ),
                Err(e) => {
                    warn!(path = %path.display(), "Skipping frame with unreadable header: {e}");
                    return None;
                }
            }
        } else {
            (None, None, None)
        };

        let exposure = match (kind, exposure) {
            (FrameKind::Bias, _) => 0.0,
            (_, Some(t)) if t.is_finite() && t >= 0.0 => t,
            _ => {
                warn!(path = %path.display(), %kind, "Skipping frame without exposure time");
                return None;
            }
        };

        Some(FrameDescriptor::new(path, kind, exposure, gain, filter))
    }
}

impl FrameSource for DirectoryFrameSource {
    fn frames(&self, session: &str, kind: FrameKind) -> Result<Vec<FrameDescriptor>> {
        validate_session_name(session)?;
        let dir = self.layout.calibration_dir(session, kind);
        let mut paths = supported_files(&dir)?;
        paths.sort();

        let descriptors: Vec<_> = paths
            .into_iter()
            .filter_map(|p| self.describe(p, kind))
            .collect();
        debug!(dir = %dir.display(), %kind, count = descriptors.len(), "Scanned frames");
        Ok(descriptors)
    }
}

fn supported_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}
