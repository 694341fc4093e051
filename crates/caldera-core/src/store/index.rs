use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::atomic::write_bytes_atomic;
use crate::master::MasterRecord;

/// Contents of the masters index file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MastersIndex {
    #[serde(default)]
    pub masters: Vec<MasterRecord>,
}

impl MastersIndex {
    /// Read the index; a missing file is an empty index.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_bytes_atomic(path, &json)
    }
}
