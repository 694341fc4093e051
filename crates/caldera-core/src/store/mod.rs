mod index;
pub mod layout;
mod masters;
mod profiles;

use std::sync::{Mutex, MutexGuard};

pub use index::MastersIndex;
pub use layout::{profile_filename, validate_session_name, StoreLayout};

/// File-backed store for master frames and sensor profiles.
///
/// Every file is written atomically. Updates to the shared masters index are
/// serialized within the process.
#[derive(Debug)]
pub struct CalibrationStore {
    layout: StoreLayout,
    index_lock: Mutex<()>,
}

impl CalibrationStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self {
            layout,
            index_lock: Mutex::new(()),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn lock_index(&self) -> MutexGuard<'_, ()> {
        self.index_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
