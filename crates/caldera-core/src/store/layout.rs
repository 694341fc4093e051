use std::path::{Path, PathBuf};

use crate::consts::{CALIBRATION_DIR, MASTERS_DIR, MASTERS_INDEX_FILE, PROFILES_DIR};
use crate::error::{CalderaError, Result};
use crate::frame::FrameKind;

/// On-disk layout of a project's calibration data.
///
/// ```text
/// {raw_data}/calibration/{session}/{bias|darks|flats}/...
/// {processed_data}/masters/.masters.json
/// {processed_data}/masters/{session}/master_*.fits
/// {processed_data}/profiles/{session}/sensor_*.json
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct StoreLayout {
    pub raw_data: PathBuf,
    pub processed_data: PathBuf,
}

impl StoreLayout {
    pub fn new(raw_data: impl Into<PathBuf>, processed_data: impl Into<PathBuf>) -> Self {
        Self {
            raw_data: raw_data.into(),
            processed_data: processed_data.into(),
        }
    }

    pub fn calibration_dir(&self, session: &str, kind: FrameKind) -> PathBuf {
        self.raw_data
            .join(CALIBRATION_DIR)
            .join(session)
            .join(kind.raw_dir_name())
    }

    pub fn masters_root(&self) -> PathBuf {
        self.processed_data.join(MASTERS_DIR)
    }

    pub fn index_path(&self) -> PathBuf {
        self.masters_root().join(MASTERS_INDEX_FILE)
    }

    pub fn masters_dir(&self, session: &str) -> PathBuf {
        self.masters_root().join(session)
    }

    pub fn master_path(&self, session: &str, filename: &str) -> PathBuf {
        self.masters_dir(session).join(filename)
    }

    pub fn profiles_dir(&self, session: &str) -> PathBuf {
        self.processed_data.join(PROFILES_DIR).join(session)
    }

    pub fn profile_path(&self, session: &str, camera_model: &str, gain: Option<i32>) -> PathBuf {
        self.profiles_dir(session)
            .join(profile_filename(camera_model, gain))
    }
}

/// `sensor_{camera}_gain{gain}.json`, gain segment omitted when unknown.
///
/// The camera model is escaped so that distinct models never share a file.
pub fn profile_filename(camera_model: &str, gain: Option<i32>) -> String {
    let camera = escape_segment(camera_model.trim());
    match gain {
        Some(g) => format!("sensor_{camera}_gain{g}.json"),
        None => format!("sensor_{camera}.json"),
    }
}

/// Keep `[A-Za-z0-9-]` and write every other byte as `%XX`.
fn escape_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Session names become a single directory level.
pub fn validate_session_name(session: &str) -> Result<()> {
    let path = Path::new(session);
    let single_component = path.components().count() == 1
        && path.file_name().is_some_and(|n| n == session);
    if session.trim().is_empty() || !single_component || session.contains(['/', '\\']) {
        return Err(CalderaError::InvalidRequest(format!(
            "invalid session name {session:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_names() {
        assert!(validate_session_name("2024-03-09").is_ok());
        assert!(validate_session_name("").is_err());
        assert!(validate_session_name("..").is_err());
        assert!(validate_session_name("a/b").is_err());
    }

    #[test]
    fn profile_names() {
        assert_eq!(profile_filename("ASI 2600MM", Some(100)), "sensor_ASI%202600MM_gain100.json");
        assert_eq!(profile_filename("ASI-2600MM", Some(100)), "sensor_ASI-2600MM_gain100.json");
        assert_eq!(profile_filename("QHY268M", None), "sensor_QHY268M.json");
        assert_eq!(profile_filename("a/b_c", Some(-5)), "sensor_a%2Fb%5Fc_gain-5.json");
    }
}
