use serde::{Deserialize, Serialize};

use super::session::SessionId;

pub type ProgramName = String;

/// Categories a neighbor can file an alert under.
///
/// Stored lowercase on disk; anything unrecognized round-trips as `Other`
/// so old feed files never fail to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertKind {
    Fire,
    Burglary,
    Medical,
    Emergency,
    Other,
}

impl AlertKind {
    /// Display badge shown in the feed and in banner messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fire => "🔥 Fire",
            Self::Burglary => "🚨 Burglary",
            Self::Medical => "🩺 Medical",
            Self::Emergency => "⚠️ Emergency",
            Self::Other => "⚠️ Alert",
        }
    }
}

impl From<String> for AlertKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "fire" => Self::Fire,
            "burglary" => Self::Burglary,
            "medical" => Self::Medical,
            "emergency" => Self::Emergency,
            _ => Self::Other,
        }
    }
}

impl From<AlertKind> for String {
    fn from(value: AlertKind) -> Self {
        match value {
            AlertKind::Fire => "fire",
            AlertKind::Burglary => "burglary",
            AlertKind::Medical => "medical",
            AlertKind::Emergency => "emergency",
            AlertKind::Other => "other",
        }
        .to_string()
    }
}

/// A point picked on the map or reported by the device.
/// Transient: lives only for the current app session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One entry in the append-only alert log. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub program: ProgramName,
    pub sender: String,
    pub kind: AlertKind,
    pub details: String,
    pub escalate: bool,
    pub lat: f64,
    pub lng: f64,
    /// Epoch milliseconds, stamped by the store's clock on submission.
    pub created_at: i64,
    pub created_by: SessionId,
}

/// Submission payload as collected from the form.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertDraft {
    pub sender: String,
    pub kind: AlertKind,
    pub details: String,
    pub escalate: bool,
    /// Selected location, if one has been pinned this session. The shell
    /// fills this from its transient selection; submissions from the form
    /// leave it unset.
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(AlertKind::Fire.label(), "🔥 Fire");
        assert_eq!(AlertKind::Burglary.label(), "🚨 Burglary");
        assert_eq!(AlertKind::Medical.label(), "🩺 Medical");
        assert_eq!(AlertKind::Emergency.label(), "⚠️ Emergency");
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&AlertKind::Fire).unwrap(), "\"fire\"");
        assert_eq!(
            serde_json::to_string(&AlertKind::Burglary).unwrap(),
            "\"burglary\""
        );
    }

    #[test]
    fn test_unknown_kind_becomes_other() {
        let kind: AlertKind = serde_json::from_str("\"flood\"").unwrap();
        assert_eq!(kind, AlertKind::Other);
    }
}
