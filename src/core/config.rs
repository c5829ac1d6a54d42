use std::fs;
use std::io;
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::GeoPoint;
use super::presence;

lazy_static! {
    // Short dial codes only (911, 112, 999, ...). Full phone numbers are not
    // what the escalation path is for.
    static ref DIAL_CODE: Regex = Regex::new(r"^[0-9]{2,6}$").unwrap();
}

pub fn is_valid_dial_code(code: &str) -> bool {
    DIAL_CODE.is_match(code)
}

/// Application settings, persisted as settings.json in the app config dir.
/// Every field has a serde default so old files keep loading as fields are
/// added.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Number the escalation confirm dials.
    #[serde(default = "default_emergency_number")]
    pub emergency_number: String,
    /// Seconds between presence heartbeats while a program is active.
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
    /// Seconds after which a silent session drops out of the presence count.
    #[serde(default = "default_presence_ttl_seconds")]
    pub presence_ttl_seconds: u64,
    /// Initial map view before any location is picked.
    #[serde(default = "default_map_center")]
    pub map_center: GeoPoint,
    #[serde(default = "default_map_zoom")]
    pub map_zoom: u8,
}

fn default_emergency_number() -> String {
    "911".to_string()
}

fn default_heartbeat_seconds() -> u64 {
    presence::DEFAULT_HEARTBEAT_SECS
}

fn default_presence_ttl_seconds() -> u64 {
    (presence::DEFAULT_TTL_MS / 1000) as u64
}

fn default_map_center() -> GeoPoint {
    // Continental US overview.
    GeoPoint {
        lat: 39.5,
        lng: -98.35,
    }
}

fn default_map_zoom() -> u8 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            emergency_number: default_emergency_number(),
            heartbeat_seconds: default_heartbeat_seconds(),
            presence_ttl_seconds: default_presence_ttl_seconds(),
            map_center: default_map_center(),
            map_zoom: default_map_zoom(),
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    pub fn load(&self) -> Settings {
        if self.config_path.exists() {
            if let Ok(content) = fs::read_to_string(&self.config_path) {
                if let Ok(settings) = serde_json::from_str(&content) {
                    return settings;
                }
            }
        }
        Settings::default()
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}
