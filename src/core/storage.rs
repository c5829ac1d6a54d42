//! Durable storage for feed state.
//!
//! One JSON file per logical key under the app data directory, mirroring the
//! flat key/value layout the feature set needs: session identity, program
//! list, alert log, last-seen mark, presence roster. Reads never fail:
//! absent or malformed files yield the type's default, so a corrupt file is
//! indistinguishable from a fresh profile.

use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const SESSION_FILE: &str = "session.json";
pub const PROGRAMS_FILE: &str = "programs.json";
pub const ALERTS_FILE: &str = "alerts.json";
pub const LAST_SEEN_FILE: &str = "last_seen.json";
pub const PRESENCE_FILE: &str = "presence.json";

pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => T::default(),
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)
}
