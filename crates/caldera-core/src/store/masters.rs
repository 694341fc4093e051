use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{CalderaError, Result};
use crate::io::fits::{read_fits, write_fits};
use crate::master::{MasterFrame, MasterRecord};

use super::index::MastersIndex;
use super::CalibrationStore;

impl CalibrationStore {
    /// Write the master FITS file and append its record to the index.
    /// Returns the path of the written file.
    ///
    /// The index is read before anything is written. Earlier records of the
    /// same session that named the same file are dropped from the index,
    /// since the file now holds the new master.
    pub fn save_master(&self, master: &MasterFrame) -> Result<PathBuf> {
        let record = &master.record;
        let path = self.master_file(record);

        let _guard = self.lock_index();
        let index_path = self.layout.index_path();
        let mut index = MastersIndex::read(&index_path)?;

        write_fits(&path, &master.data, &record.fits_header())?;

        let superseded: Vec<Uuid> = index
            .masters
            .iter()
            .filter(|m| m.session == record.session && m.filename == record.filename)
            .map(|m| m.id)
            .collect();
        if !superseded.is_empty() {
            index.masters.retain(|m| !superseded.contains(&m.id));
            info!(
                filename = %record.filename,
                superseded = ?superseded,
                "Earlier master replaced"
            );
        }
        index.masters.push(record.clone());
        index.write(&index_path)?;

        debug!(id = %record.id, path = %path.display(), "Master recorded");
        Ok(path)
    }

    /// Path of a master's FITS file.
    pub fn master_file(&self, record: &MasterRecord) -> PathBuf {
        self.layout.master_path(&record.session, &record.filename)
    }

    /// All recorded masters, optionally limited to one session, oldest first.
    pub fn list_masters(&self, session: Option<&str>) -> Result<Vec<MasterRecord>> {
        let index = MastersIndex::read(&self.layout.index_path())?;
        Ok(index
            .masters
            .into_iter()
            .filter(|m| session.is_none_or(|s| m.session == s))
            .collect())
    }

    pub fn get_master(&self, id: Uuid) -> Result<MasterRecord> {
        self.list_masters(None)?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| CalderaError::MasterNotFound(id.to_string()))
    }

    /// Read a recorded master's pixels back from disk.
    pub fn load_master(&self, id: Uuid) -> Result<MasterFrame> {
        let record = self.get_master(id)?;
        let image = read_fits(&self.master_file(&record))?;
        if image
            .header
            .get_str("MASTERID")
            .is_some_and(|file_id| file_id != record.id.to_string())
        {
            return Err(CalderaError::InvalidFits(format!(
                "{} holds a different master than record {}",
                record.filename, record.id
            )));
        }
        if image.data.dim() != (record.height, record.width) {
            return Err(CalderaError::InvalidFits(format!(
                "{} does not match its record ({}x{})",
                record.filename, record.width, record.height
            )));
        }
        Ok(MasterFrame {
            record,
            data: image.data,
        })
    }

    /// Remove a master's record. With `delete_file`, its FITS file is removed
    /// too unless another record of the same session still points at it.
    pub fn delete_master(&self, id: Uuid, delete_file: bool) -> Result<MasterRecord> {
        let _guard = self.lock_index();
        let index_path = self.layout.index_path();
        let mut index = MastersIndex::read(&index_path)?;

        let pos = index
            .masters
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| CalderaError::MasterNotFound(id.to_string()))?;
        let removed = index.masters.remove(pos);

        if delete_file {
            self.remove_unreferenced_file(&index, &removed)?;
        }
        index.write(&index_path)?;

        info!(id = %id, filename = %removed.filename, "Master deleted");
        Ok(removed)
    }

    /// Remove every master record of a session, and optionally their files.
    /// Returns the number of records removed.
    pub fn delete_session_masters(&self, session: &str, delete_files: bool) -> Result<usize> {
        let _guard = self.lock_index();
        let index_path = self.layout.index_path();
        let mut index = MastersIndex::read(&index_path)?;

        let (removed, kept): (Vec<_>, Vec<_>) =
            index.masters.into_iter().partition(|m| m.session == session);
        index.masters = kept;

        if delete_files {
            for record in &removed {
                self.remove_unreferenced_file(&index, record)?;
            }
        }
        index.write(&index_path)?;

        info!(session, count = removed.len(), "Session masters deleted");
        Ok(removed.len())
    }

    fn remove_unreferenced_file(&self, index: &MastersIndex, record: &MasterRecord) -> Result<()> {
        let still_used = index
            .masters
            .iter()
            .any(|m| m.session == record.session && m.filename == record.filename);
        let path = self.master_file(record);
        if !still_used && path.exists() {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "Master file removed");
        }
        Ok(())
    }
}
