use crate::consts::EXPOSURE_TOLERANCE;
use crate::frame::{FrameDescriptor, FrameKind};

use super::{MasterNote, MetadataOverrides};

/// Metadata resolved for a master frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StampedMetadata {
    pub exposure_time: Option<f64>,
    pub gain: Option<i32>,
    pub filter: Option<String>,
    pub notes: Vec<MasterNote>,
}

/// Resolve exposure, gain and filter for a master.
///
/// Each field comes from the explicit override if given, otherwise from the
/// inputs when they all agree. Disagreeing inputs leave the field unset and
/// add a note; no input's value is ever picked arbitrarily. Bias exposure is
/// always zero and only flats carry a filter.
pub fn stamp_metadata(
    kind: FrameKind,
    frames: &[FrameDescriptor],
    overrides: &MetadataOverrides,
) -> StampedMetadata {
    let mut notes = Vec::new();

    let exposure_time = if kind == FrameKind::Bias {
        Some(0.0)
    } else if let Some(t) = overrides.exposure_time {
        Some(t)
    } else {
        let mut values: Vec<f64> = Vec::new();
        for f in frames {
            if !values
                .iter()
                .any(|v| (v - f.exposure_time).abs() <= EXPOSURE_TOLERANCE)
            {
                values.push(f.exposure_time);
            }
        }
        values.sort_by(|a, b| a.total_cmp(b));
        match values.as_slice() {
            [single] => Some(*single),
            [] => None,
            _ => {
                notes.push(MasterNote::AmbiguousExposure { values });
                None
            }
        }
    };

    let gain = if overrides.gain.is_some() {
        overrides.gain
    } else {
        let mut values: Vec<Option<i32>> = frames.iter().map(|f| f.gain).collect();
        values.sort();
        values.dedup();
        unanimous(values, |values| MasterNote::AmbiguousGain { values }, &mut notes)
    };

    let filter = if kind != FrameKind::Flat {
        None
    } else if overrides.filter.is_some() {
        overrides.filter.clone()
    } else {
        let mut values: Vec<Option<String>> = frames.iter().map(|f| f.filter.clone()).collect();
        values.sort();
        values.dedup();
        unanimous(values, |values| MasterNote::AmbiguousFilter { values }, &mut notes)
    };

    StampedMetadata {
        exposure_time,
        gain,
        filter,
        notes,
    }
}

fn unanimous<T>(
    values: Vec<Option<T>>,
    note: impl FnOnce(Vec<Option<T>>) -> MasterNote,
    notes: &mut Vec<MasterNote>,
) -> Option<T> {
    if values.len() > 1 {
        notes.push(note(values));
        return None;
    }
    values.into_iter().next().flatten()
}
