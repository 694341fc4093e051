use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::consts::{FITS_EXTENSIONS, RASTER_EXTENSIONS};
use crate::error::{CalderaError, Result};
use crate::frame::{FrameDescriptor, RawFrame};

use super::fits::read_fits;
use super::image_io::load_raster;

/// Whether `path` has a FITS extension.
pub fn is_fits(path: &Path) -> bool {
    has_extension(path, &FITS_EXTENSIONS)
}

/// Whether `path` has an extension this crate can load.
pub fn is_supported(path: &Path) -> bool {
    is_fits(path) || has_extension(path, &RASTER_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

/// Load the pixels of a described frame.
///
/// Every failure, including unsupported formats, is reported as
/// `FrameLoad` naming the offending path.
pub fn load_frame(descriptor: &FrameDescriptor) -> Result<RawFrame> {
    let path = descriptor.path();
    let loaded = if is_fits(path) {
        read_fits(path).map(|img| {
            let depth = img.bit_depth();
            (img.data, depth)
        })
    } else if has_extension(path, &RASTER_EXTENSIONS) {
        load_raster(path)
    } else {
        Err(CalderaError::InvalidRequest("unsupported file extension".into()))
    };

    let (data, bit_depth) = loaded.map_err(|e| CalderaError::FrameLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if data.is_empty() {
        return Err(CalderaError::FrameLoad {
            path: path.to_path_buf(),
            reason: "image has no pixels".into(),
        });
    }

    debug!(
        path = %path.display(),
        width = data.ncols(),
        height = data.nrows(),
        bit_depth,
        "Loaded frame"
    );
    Ok(RawFrame::new(descriptor.clone(), data, bit_depth))
}

/// Load every descriptor in parallel. Any unreadable file fails the whole
/// batch.
pub fn load_frames(descriptors: &[FrameDescriptor]) -> Result<Vec<RawFrame>> {
    load_frames_with_progress(descriptors, |_| {})
}

/// Load every descriptor, calling `on_progress(items_done)` as each frame
/// finishes.
pub fn load_frames_with_progress(
    descriptors: &[FrameDescriptor],
    on_progress: impl Fn(usize) + Send + Sync,
) -> Result<Vec<RawFrame>> {
    let done = AtomicUsize::new(0);
    descriptors
        .par_iter()
        .map(|d| {
            let frame = load_frame(d)?;
            on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
            Ok(frame)
        })
        .collect()
}
