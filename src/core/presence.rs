//! Heartbeat-based presence roster.
//!
//! Approximates "who else is looking at this program right now" for a single
//! machine profile: every open instance stamps its session id on a fixed
//! interval, and entries older than the TTL drop out. Stale entries are
//! garbage-collected lazily, only at read/update time, so the count is
//! eventually consistent, bounded by the heartbeat interval.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use super::clock::Clock;
use super::session::SessionId;
use super::storage;

/// Entries older than this are considered gone.
pub const DEFAULT_TTL_MS: i64 = 2 * 60 * 1000;
/// How often a live instance re-stamps itself.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 15;

type RosterMap = HashMap<String, HashMap<SessionId, i64>>;

pub struct PresenceRoster {
    path: PathBuf,
    clock: Box<dyn Clock>,
    ttl_ms: i64,
}

impl PresenceRoster {
    pub fn open(data_dir: &Path, clock: Box<dyn Clock>) -> Self {
        Self::with_ttl(data_dir, clock, DEFAULT_TTL_MS)
    }

    pub fn with_ttl(data_dir: &Path, clock: Box<dyn Clock>, ttl_ms: i64) -> Self {
        Self {
            path: data_dir.join(storage::PRESENCE_FILE),
            clock,
            ttl_ms,
        }
    }

    /// Stamp this session as live in `program` and return how many sessions
    /// are live there, the caller included.
    ///
    /// Reads the roster fresh each time: other instances write the same file
    /// between our heartbeats, and a stale in-memory copy would resurrect
    /// entries they pruned.
    pub fn heartbeat(&self, program: &str, session: SessionId) -> io::Result<usize> {
        let mut roster: RosterMap = storage::read_or_default(&self.path);
        let now = self.clock.now_ms();

        let entries = roster.entry(program.to_string()).or_default();
        entries.retain(|_, seen_at| now - *seen_at <= self.ttl_ms);
        entries.insert(session, now);
        let count = entries.len();

        storage::write_json(&self.path, &roster)?;
        Ok(count)
    }

    /// Live-session count without stamping anything. Pruning here is purely
    /// a view-side filter; the file is not rewritten.
    pub fn active_count(&self, program: &str) -> usize {
        let roster: RosterMap = storage::read_or_default(&self.path);
        let now = self.clock.now_ms();

        roster
            .get(program)
            .map(|entries| {
                entries
                    .values()
                    .filter(|seen_at| now - **seen_at <= self.ttl_ms)
                    .count()
            })
            .unwrap_or(0)
    }
}
