//! Cross-instance change detection.
//!
//! The storage files are shared by every open instance of the app on this
//! profile. There is no IPC between instances; each one polls the files'
//! metadata and does a full re-read when something moved. Last writer wins;
//! no merge, no conflict detection.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::storage;

/// Which stores changed since the previous poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreChanges {
    pub alerts: bool,
    pub presence: bool,
}

impl StoreChanges {
    pub fn any(self) -> bool {
        self.alerts || self.presence
    }
}

/// Modified-time + length fingerprint of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

fn fingerprint(path: &Path) -> Fingerprint {
    match fs::metadata(path) {
        Ok(meta) => Fingerprint {
            modified: meta.modified().ok(),
            len: meta.len(),
        },
        Err(_) => Fingerprint {
            modified: None,
            len: 0,
        },
    }
}

pub struct StoreWatcher {
    alerts_path: PathBuf,
    presence_path: PathBuf,
    alerts_seen: Fingerprint,
    presence_seen: Fingerprint,
}

impl StoreWatcher {
    /// Baselines on the files' current state; only changes after this point
    /// are reported.
    pub fn new(data_dir: &Path) -> Self {
        let alerts_path = data_dir.join(storage::ALERTS_FILE);
        let presence_path = data_dir.join(storage::PRESENCE_FILE);
        let alerts_seen = fingerprint(&alerts_path);
        let presence_seen = fingerprint(&presence_path);

        Self {
            alerts_path,
            presence_path,
            alerts_seen,
            presence_seen,
        }
    }

    pub fn poll(&mut self) -> StoreChanges {
        let mut changes = StoreChanges::default();

        let alerts_now = fingerprint(&self.alerts_path);
        if alerts_now != self.alerts_seen {
            self.alerts_seen = alerts_now;
            changes.alerts = true;
        }

        let presence_now = fingerprint(&self.presence_path);
        if presence_now != self.presence_seen {
            self.presence_seen = presence_now;
            changes.presence = true;
        }

        changes
    }
}
