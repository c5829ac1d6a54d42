//! The alert feed store.
//!
//! Owns the append-only alert log, the known-program list, and the active
//! program pointer, mirrored from the JSON files in the data directory.
//! Concurrent instances reconcile through full re-reads (see
//! [`super::watcher`]); last writer wins, which matches the single-profile
//! deployment this is built for.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::model::{AlertDraft, AlertRecord, ProgramName};
use super::session::SessionId;
use super::storage;

lazy_static! {
    static ref INNER_WS: Regex = Regex::new(r"\s+").unwrap();
}

/// Known program names plus the active pointer, as persisted in
/// `programs.json`. Programs are created on first selection and never
/// deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramList {
    pub names: Vec<ProgramName>,
    pub active: Option<ProgramName>,
}

/// High-water mark for the "new alert" banner, persisted separately so it
/// stays per-profile even though the alert log is shared between instances.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct LastSeen {
    at_ms: i64,
}

/// Why a submission was refused. Nothing is appended and nothing is
/// persisted when one of these comes back.
#[derive(Debug)]
pub enum SubmitError {
    NoActiveProgram,
    NoLocation,
    Storage(io::Error),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActiveProgram => write!(f, "Select or create a watch program first."),
            Self::NoLocation => write!(f, "Pin a location on the map or use GPS first."),
            Self::Storage(e) => write!(f, "Could not save the alert: {e}"),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<io::Error> for SubmitError {
    fn from(e: io::Error) -> Self {
        Self::Storage(e)
    }
}

pub struct AlertFeed {
    data_dir: PathBuf,
    clock: Box<dyn Clock>,
    programs: ProgramList,
    alerts: Vec<AlertRecord>,
    last_seen_ms: i64,
}

impl AlertFeed {
    /// Open the feed backed by `data_dir`, reading whatever state is already
    /// there. Missing or corrupt files start empty.
    pub fn open(data_dir: PathBuf, clock: Box<dyn Clock>) -> Self {
        let programs = storage::read_or_default(&data_dir.join(storage::PROGRAMS_FILE));
        let alerts = storage::read_or_default(&data_dir.join(storage::ALERTS_FILE));
        let last_seen: LastSeen = storage::read_or_default(&data_dir.join(storage::LAST_SEEN_FILE));

        Self {
            data_dir,
            clock,
            programs,
            alerts,
            last_seen_ms: last_seen.at_ms,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn programs(&self) -> &ProgramList {
        &self.programs
    }

    pub fn active_program(&self) -> Option<&str> {
        self.programs.active.as_deref()
    }

    /// Re-read the alert log from disk. Called when another instance wrote
    /// it; the in-memory program list is authoritative for this instance.
    pub fn reload_alerts(&mut self) {
        self.alerts = storage::read_or_default(&self.data_dir.join(storage::ALERTS_FILE));
    }

    /// Create the program if the name is new, and make it active either way.
    /// Blank input is a silent no-op returning `None`. Inner whitespace runs
    /// collapse so " Maple  St " and "Maple St" are the same program.
    pub fn create_or_select_program(&mut self, name: &str) -> io::Result<Option<ProgramName>> {
        let name = normalize_program_name(name);
        if name.is_empty() {
            return Ok(None);
        }

        if !self.programs.names.iter().any(|n| n == &name) {
            self.programs.names.push(name.clone());
        }
        self.programs.active = Some(name.clone());
        self.persist_programs()?;

        Ok(Some(name))
    }

    /// Startup rule: a profile with saved programs but no active pointer
    /// resumes in its first program.
    pub fn select_first_program_if_unset(&mut self) -> io::Result<()> {
        if self.programs.active.is_none() {
            if let Some(first) = self.programs.names.first().cloned() {
                self.programs.active = Some(first);
                self.persist_programs()?;
            }
        }
        Ok(())
    }

    /// Append a new alert to the active program. Both preconditions are
    /// checked here so callers get one typed refusal to surface.
    pub fn submit_alert(
        &mut self,
        draft: AlertDraft,
        session: SessionId,
    ) -> Result<AlertRecord, SubmitError> {
        let program = match self.programs.active.clone() {
            Some(p) => p,
            None => return Err(SubmitError::NoActiveProgram),
        };
        let location = draft.location.ok_or(SubmitError::NoLocation)?;

        let sender = match draft.sender.trim() {
            "" => "Anonymous Neighbor".to_string(),
            s => s.to_string(),
        };

        let record = AlertRecord {
            program,
            sender,
            kind: draft.kind,
            details: draft.details.trim().to_string(),
            escalate: draft.escalate,
            lat: location.lat,
            lng: location.lng,
            created_at: self.clock.now_ms(),
            created_by: session,
        };

        self.alerts.push(record.clone());
        self.persist_alerts()?;

        log::info!(
            "alert posted: {} in {} by {}",
            record.kind.label(),
            record.program,
            record.created_by
        );
        Ok(record)
    }

    /// Alerts for one program, newest first. `None` means the whole log.
    pub fn alerts_for(&self, program: Option<&str>) -> Vec<AlertRecord> {
        let mut list: Vec<AlertRecord> = self
            .alerts
            .iter()
            .filter(|a| program.map_or(true, |p| a.program == p))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// The view the feed renders: active program's alerts, newest first,
    /// empty when no program is active.
    pub fn alerts_for_active(&self) -> Vec<AlertRecord> {
        match self.programs.active.as_deref() {
            Some(p) => self.alerts_for(Some(p)),
            None => Vec::new(),
        }
    }

    /// The newest alert in the active program, if this session has not been
    /// shown it yet and did not author it.
    ///
    /// Advances the persisted high-water mark whenever the newest record is
    /// past it, whether or not the record qualifies for a banner, so the
    /// signal is one-shot per newest record. If two alerts land between two
    /// calls, only the newer one can produce a banner; the feed view itself
    /// always shows both.
    pub fn latest_unseen(&mut self, session: SessionId) -> io::Result<Option<AlertRecord>> {
        let newest = match self.alerts_for_active().into_iter().next() {
            Some(a) => a,
            None => return Ok(None),
        };

        let fresh = newest.created_at > self.last_seen_ms && newest.created_by != session;

        if newest.created_at > self.last_seen_ms {
            self.last_seen_ms = newest.created_at;
            storage::write_json(
                &self.data_dir.join(storage::LAST_SEEN_FILE),
                &LastSeen {
                    at_ms: self.last_seen_ms,
                },
            )?;
        }

        Ok(fresh.then_some(newest))
    }

    fn persist_programs(&self) -> io::Result<()> {
        storage::write_json(&self.data_dir.join(storage::PROGRAMS_FILE), &self.programs)
    }

    fn persist_alerts(&self) -> io::Result<()> {
        storage::write_json(&self.data_dir.join(storage::ALERTS_FILE), &self.alerts)
    }
}

fn normalize_program_name(raw: &str) -> String {
    INNER_WS.replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::model::{AlertKind, GeoPoint};
    use tempfile::tempdir;

    fn feed_at(dir: &Path, clock: &ManualClock) -> AlertFeed {
        AlertFeed::open(dir.to_path_buf(), Box::new(clock.clone()))
    }

    fn draft(kind: AlertKind, details: &str) -> AlertDraft {
        AlertDraft {
            sender: "Sam".to_string(),
            kind,
            details: details.to_string(),
            escalate: false,
            location: Some(GeoPoint {
                lat: 37.0,
                lng: -122.0,
            }),
        }
    }

    #[test]
    fn test_create_or_select_is_idempotent() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);

        assert_eq!(
            feed.create_or_select_program("Maple St").unwrap(),
            Some("Maple St".to_string())
        );
        feed.create_or_select_program("Oak Ave").unwrap();
        feed.create_or_select_program("Maple St").unwrap();

        assert_eq!(feed.programs().names, vec!["Maple St", "Oak Ave"]);
        assert_eq!(feed.active_program(), Some("Maple St"));
    }

    #[test]
    fn test_blank_name_is_a_no_op() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);

        feed.create_or_select_program("Maple St").unwrap();
        assert_eq!(feed.create_or_select_program("   ").unwrap(), None);

        // Neither list nor pointer moved.
        assert_eq!(feed.programs().names, vec!["Maple St"]);
        assert_eq!(feed.active_program(), Some("Maple St"));
    }

    #[test]
    fn test_name_whitespace_is_normalized() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);

        feed.create_or_select_program("  Maple   St ").unwrap();
        feed.create_or_select_program("Maple St").unwrap();

        assert_eq!(feed.programs().names, vec!["Maple St"]);
    }

    #[test]
    fn test_submit_requires_active_program() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);
        let session = SessionId::generate();

        let result = feed.submit_alert(draft(AlertKind::Fire, "smoke"), session);

        assert!(matches!(result, Err(SubmitError::NoActiveProgram)));
        assert!(feed.alerts_for(None).is_empty());
    }

    #[test]
    fn test_submit_requires_location() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);
        let session = SessionId::generate();

        feed.create_or_select_program("Maple St").unwrap();
        let mut d = draft(AlertKind::Fire, "smoke");
        d.location = None;

        let result = feed.submit_alert(d, session);

        assert!(matches!(result, Err(SubmitError::NoLocation)));
        assert!(feed.alerts_for(None).is_empty());
    }

    #[test]
    fn test_listing_is_newest_first_and_scoped() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(1_000);
        let mut feed = feed_at(dir.path(), &clock);
        let session = SessionId::generate();

        feed.create_or_select_program("Maple St").unwrap();
        feed.submit_alert(draft(AlertKind::Fire, "first"), session)
            .unwrap();
        clock.advance(100);
        feed.submit_alert(draft(AlertKind::Medical, "second"), session)
            .unwrap();

        feed.create_or_select_program("Oak Ave").unwrap();
        clock.advance(100);
        feed.submit_alert(draft(AlertKind::Burglary, "elsewhere"), session)
            .unwrap();

        let maple = feed.alerts_for(Some("Maple St"));
        assert_eq!(maple.len(), 2);
        assert_eq!(maple[0].details, "second");
        assert_eq!(maple[1].details, "first");

        // No program filter sees everything.
        assert_eq!(feed.alerts_for(None).len(), 3);
    }

    #[test]
    fn test_blank_sender_defaults_to_anonymous() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let mut feed = feed_at(dir.path(), &clock);

        feed.create_or_select_program("Maple St").unwrap();
        let mut d = draft(AlertKind::Emergency, "help");
        d.sender = "   ".to_string();

        let record = feed.submit_alert(d, SessionId::generate()).unwrap();
        assert_eq!(record.sender, "Anonymous Neighbor");
    }

    #[test]
    fn test_unseen_suppressed_for_own_alert() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(1_000);
        let mut feed = feed_at(dir.path(), &clock);
        let me = SessionId::generate();

        feed.create_or_select_program("Maple St").unwrap();
        feed.submit_alert(draft(AlertKind::Fire, "mine"), me).unwrap();

        assert!(feed.latest_unseen(me).unwrap().is_none());
    }

    #[test]
    fn test_unseen_fires_once_for_remote_alert() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(1_000);
        let neighbor = SessionId::generate();
        let me = SessionId::generate();

        // Session A posts.
        let mut feed_a = feed_at(dir.path(), &clock);
        feed_a.create_or_select_program("Maple St").unwrap();
        feed_a
            .submit_alert(draft(AlertKind::Fire, "smoke in backyard"), neighbor)
            .unwrap();

        // Session B (same profile directory in this model) sees it once.
        let mut feed_b = feed_at(dir.path(), &clock);
        let first = feed_b.latest_unseen(me).unwrap();
        assert_eq!(first.unwrap().details, "smoke in backyard");

        let second = feed_b.latest_unseen(me).unwrap();
        assert!(second.is_none(), "high-water mark should have advanced");
    }

    #[test]
    fn test_mark_advances_even_when_banner_suppressed() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(1_000);
        let me = SessionId::generate();
        let neighbor = SessionId::generate();

        let mut feed = feed_at(dir.path(), &clock);
        feed.create_or_select_program("Maple St").unwrap();
        feed.submit_alert(draft(AlertKind::Fire, "mine"), me).unwrap();

        // Own post: no banner, but the mark moves past it.
        assert!(feed.latest_unseen(me).unwrap().is_none());

        // The same newest record stays consumed.
        assert!(feed.latest_unseen(me).unwrap().is_none());

        // A newer remote record fires.
        clock.advance(50);
        feed.submit_alert(draft(AlertKind::Medical, "theirs"), neighbor)
            .unwrap();
        assert!(feed.latest_unseen(me).unwrap().is_some());
    }

    #[test]
    fn test_end_to_end_fire_scenario() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(5_000);
        let mut feed = feed_at(dir.path(), &clock);
        let session = SessionId::generate();

        feed.create_or_select_program("Maple St").unwrap();
        let record = feed
            .submit_alert(
                AlertDraft {
                    sender: String::new(),
                    kind: AlertKind::Fire,
                    details: "smoke in backyard".to_string(),
                    escalate: true,
                    location: Some(GeoPoint {
                        lat: 37.0,
                        lng: -122.0,
                    }),
                },
                session,
            )
            .unwrap();

        assert_eq!(record.kind.label(), "🔥 Fire");
        assert!(record.escalate);

        let listed = feed.alerts_for(Some("Maple St"));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], record);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let session = SessionId::generate();

        {
            let mut feed = feed_at(dir.path(), &clock);
            feed.create_or_select_program("Maple St").unwrap();
            feed.submit_alert(draft(AlertKind::Burglary, "window"), session)
                .unwrap();
        }

        let feed = feed_at(dir.path(), &clock);
        assert_eq!(feed.active_program(), Some("Maple St"));
        assert_eq!(feed.alerts_for_active().len(), 1);
    }

    #[test]
    fn test_first_program_selected_on_startup() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);

        // Simulate a saved list with no pointer.
        storage::write_json(
            &dir.path().join(storage::PROGRAMS_FILE),
            &ProgramList {
                names: vec!["Maple St".to_string(), "Oak Ave".to_string()],
                active: None,
            },
        )
        .unwrap();

        let mut feed = feed_at(dir.path(), &clock);
        feed.select_first_program_if_unset().unwrap();
        assert_eq!(feed.active_program(), Some("Maple St"));
    }

    #[test]
    fn test_reload_picks_up_other_instances_writes() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::at(0);
        let session = SessionId::generate();

        let mut feed_a = feed_at(dir.path(), &clock);
        let mut feed_b = feed_at(dir.path(), &clock);
        feed_a.create_or_select_program("Maple St").unwrap();
        feed_b.create_or_select_program("Maple St").unwrap();

        feed_a
            .submit_alert(draft(AlertKind::Emergency, "from A"), session)
            .unwrap();

        assert!(feed_b.alerts_for_active().is_empty());
        feed_b.reload_alerts();
        assert_eq!(feed_b.alerts_for_active().len(), 1);
    }
}
