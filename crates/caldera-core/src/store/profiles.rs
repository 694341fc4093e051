use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::characterize::SensorProfile;
use crate::error::Result;
use crate::io::atomic::write_bytes_atomic;

use super::{validate_session_name, CalibrationStore};

impl CalibrationStore {
    /// Write a profile as pretty JSON, replacing any earlier profile for the
    /// same session, camera and gain setting.
    pub fn save_profile(&self, profile: &SensorProfile) -> Result<PathBuf> {
        validate_session_name(&profile.session)?;
        let path = self.layout.profile_path(
            &profile.session,
            &profile.camera_model,
            profile.gain_setting,
        );
        let json = serde_json::to_vec_pretty(profile)?;
        write_bytes_atomic(&path, &json)?;
        debug!(path = %path.display(), "Profile written");
        Ok(path)
    }

    /// Profiles stored for a session, most recent measurement first.
    /// Files that do not parse are skipped with a warning.
    pub fn list_profiles(&self, session: &str) -> Result<Vec<SensorProfile>> {
        validate_session_name(session)?;
        let dir = self.layout.profiles_dir(session);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<SensorProfile>(&contents) {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable profile: {e}"),
            }
        }
        profiles.sort_by(|a, b| b.measured_at.cmp(&a.measured_at));
        Ok(profiles)
    }
}
