use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::combine::combine_arrays;
use crate::error::{CalderaError, Result};
use crate::frame::{ensure_same_dimensions, RawFrame};
use crate::io::loader::load_frames_with_progress;
use crate::progress::{NoOpReporter, ProgressReporter, Stage};
use crate::stats::PixelStats;
use crate::store::{validate_session_name, CalibrationStore};

use super::naming::master_filename;
use super::stamping::stamp_metadata;
use super::{CombinationRequest, MasterFrame, MasterRecord, MasterStats};

/// Combine the requested raw frames into a master and persist it.
///
/// All preconditions (non-empty selection, matching kinds, readable files,
/// identical dimensions) are checked before any pixel is combined, and
/// nothing is written unless they all hold.
pub fn combine(request: &CombinationRequest, store: &CalibrationStore) -> Result<MasterFrame> {
    combine_reported(request, store, &NoOpReporter)
}

/// [`combine`] with progress reporting.
pub fn combine_reported(
    request: &CombinationRequest,
    store: &CalibrationStore,
    reporter: &dyn ProgressReporter,
) -> Result<MasterFrame> {
    validate_request(request)?;

    let total = request.frames.len();
    info!(
        session = %request.session,
        kind = %request.kind,
        frames = total,
        method = %request.method,
        rejection = %request.rejection,
        "Combining calibration frames"
    );

    reporter.begin_stage(Stage::Loading, Some(total));
    let frames = load_frames_with_progress(&request.frames, |done| reporter.advance(done))?;
    reporter.finish_stage();

    reporter.begin_stage(Stage::Combining, None);
    let master = combine_frames(request, &frames)?;
    reporter.finish_stage();

    reporter.begin_stage(Stage::Writing, None);
    let path = store.save_master(&master)?;
    reporter.finish_stage();

    info!(
        id = %master.record.id,
        path = %path.display(),
        rejected = master.record.stats.rejected_samples,
        "Master saved"
    );
    Ok(master)
}

/// Combine already loaded frames without touching storage.
///
/// `frames` are the loaded pixels of `request.frames`. The result does not
/// depend on their order.
pub fn combine_frames(request: &CombinationRequest, frames: &[RawFrame]) -> Result<MasterFrame> {
    validate_request(request)?;
    if frames.len() != request.frames.len() {
        return Err(CalderaError::InvalidRequest(format!(
            "{} frames loaded for {} selected",
            frames.len(),
            request.frames.len()
        )));
    }

    let mut ordered: Vec<&RawFrame> = frames.iter().collect();
    ordered.sort_by(|a, b| a.path().cmp(b.path()));
    ensure_same_dimensions(&ordered)?;

    let stamped = stamp_metadata(request.kind, &request.frames, &request.overrides);
    for note in &stamped.notes {
        warn!(session = %request.session, kind = %request.kind, "{note}");
    }

    let arrays: Vec<_> = ordered.iter().map(|f| &f.data).collect();
    let combined = combine_arrays(&arrays, request.method, &request.rejection)?;
    let (height, width) = combined.data.dim();

    let filename = master_filename(
        request.kind,
        stamped.exposure_time,
        stamped.gain,
        stamped.filter.as_deref(),
    );

    let record = MasterRecord {
        id: Uuid::new_v4(),
        session: request.session.clone(),
        kind: request.kind,
        width,
        height,
        frame_count: frames.len(),
        method: request.method,
        rejection: request.rejection,
        exposure_time: stamped.exposure_time,
        gain: stamped.gain,
        filter: stamped.filter,
        filename,
        created_at: Utc::now(),
        stats: MasterStats {
            pixels: PixelStats::of(&combined.data),
            rejected_samples: combined.rejected_samples,
        },
        notes: stamped.notes,
    };

    Ok(MasterFrame {
        record,
        data: combined.data,
    })
}

fn validate_request(request: &CombinationRequest) -> Result<()> {
    if request.frames.is_empty() {
        return Err(CalderaError::EmptySelection);
    }
    validate_session_name(&request.session)?;

    for frame in &request.frames {
        if frame.kind != request.kind {
            return Err(CalderaError::KindMismatch {
                path: frame.path.clone(),
                expected: request.kind,
                found: frame.kind,
            });
        }
        if !(frame.exposure_time.is_finite() && frame.exposure_time >= 0.0) {
            return Err(CalderaError::InvalidRequest(format!(
                "invalid exposure time {} for {}",
                frame.exposure_time,
                frame.path.display()
            )));
        }
    }

    if let Some(t) = request.overrides.exposure_time {
        if !(t.is_finite() && t >= 0.0) {
            return Err(CalderaError::InvalidRequest(format!(
                "invalid exposure override {t}"
            )));
        }
    }

    request.rejection.validate()
}
