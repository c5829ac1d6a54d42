//! Per-profile session identity.
//!
//! An opaque random id, persisted once on first launch. It attributes alerts,
//! suppresses "new alert" banners for the author's own posts, and keys
//! presence entries. It is not an account and carries no user data.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Load the persisted identity, minting and saving a fresh one if the file
/// is absent or unreadable.
pub fn load_or_create(data_dir: &Path) -> io::Result<SessionId> {
    let path = data_dir.join(storage::SESSION_FILE);

    if let Ok(content) = fs::read_to_string(&path) {
        if let Ok(id) = serde_json::from_str::<SessionId>(&content) {
            return Ok(id);
        }
    }

    let id = SessionId::generate();
    storage::write_json(&path, &id)?;
    Ok(id)
}
