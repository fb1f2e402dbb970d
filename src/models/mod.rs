//! Data models for tado-presence

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeviceError;

// ============================================================================
// Home Mode
// ============================================================================

/// Presence mode of the tado home
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HomeMode {
    Home,
    Away,
}

impl HomeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HomeMode::Home => "HOME",
            HomeMode::Away => "AWAY",
        }
    }

    /// Parse the `presence` value reported by the API
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HOME" => Some(HomeMode::Home),
            "AWAY" => Some(HomeMode::Away),
            _ => None,
        }
    }

    /// Label used for a device's `atHome` flag in transition lines
    pub fn from_at_home(at_home: bool) -> Self {
        if at_home {
            HomeMode::Home
        } else {
            HomeMode::Away
        }
    }
}

impl fmt::Display for HomeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credentials
// ============================================================================

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

// ============================================================================
// Mobile Device Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLocation {
    pub at_home: bool,
    pub stale: bool,
}

/// A mobile device as seen in one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub tracking_enabled: bool,
    pub location: Option<DeviceLocation>,
}

impl DeviceRecord {
    /// Counts towards occupancy
    pub fn is_present(&self) -> bool {
        match self.location {
            Some(loc) => self.tracking_enabled && loc.at_home && !loc.stale,
            None => false,
        }
    }

    /// Build a record from the raw JSON object returned by `mobileDevices`.
    ///
    /// `settings.geoTrackingEnabled` is only required when a location is
    /// reported, and `location.atHome` / `location.stale` only when tracking
    /// is enabled. A `null` or empty location means the device has no
    /// location information.
    pub fn from_value(value: &Value) -> Result<Self, DeviceError> {
        let label = device_label(value);

        let raw: RawDevice =
            serde_json::from_value(value.clone()).map_err(|source| DeviceError::Malformed {
                device: label.clone(),
                source,
            })?;

        let id = raw
            .id
            .map(|id| id.into_string())
            .ok_or_else(|| DeviceError::MissingField {
                device: label.clone(),
                field: "id",
            })?;
        let name = raw.name.ok_or_else(|| DeviceError::MissingField {
            device: id.clone(),
            field: "name",
        })?;

        let tracking_setting = raw.settings.and_then(|s| s.geo_tracking_enabled);

        let location = match raw.location {
            Some(loc) if !loc.is_empty() => loc,
            _ => {
                return Ok(Self {
                    id,
                    name,
                    tracking_enabled: tracking_setting.unwrap_or(false),
                    location: None,
                })
            }
        };

        let tracking_enabled = tracking_setting.ok_or_else(|| DeviceError::MissingField {
            device: id.clone(),
            field: "settings.geoTrackingEnabled",
        })?;

        let location = if tracking_enabled {
            DeviceLocation {
                at_home: location.at_home.ok_or_else(|| DeviceError::MissingField {
                    device: id.clone(),
                    field: "location.atHome",
                })?,
                stale: location.stale.ok_or_else(|| DeviceError::MissingField {
                    device: id.clone(),
                    field: "location.stale",
                })?,
            }
        } else {
            DeviceLocation {
                at_home: location.at_home.unwrap_or(false),
                stale: location.stale.unwrap_or(false),
            }
        };

        Ok(Self {
            id,
            name,
            tracking_enabled,
            location: Some(location),
        })
    }
}

/// Best-effort identifier for error messages about a record that failed to parse
fn device_label(value: &Value) -> String {
    match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "<unknown>".to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    id: Option<RawId>,
    name: Option<String>,
    settings: Option<RawSettings>,
    location: Option<RawLocation>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(rename = "geoTrackingEnabled")]
    geo_tracking_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    #[serde(rename = "atHome")]
    at_home: Option<bool>,
    stale: Option<bool>,
    #[serde(flatten)]
    extra: serde_json::Map<String, Value>,
}

impl RawLocation {
    fn is_empty(&self) -> bool {
        self.at_home.is_none() && self.stale.is_none() && self.extra.is_empty()
    }
}
