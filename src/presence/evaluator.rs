//! Occupancy inference from mobile device records

use std::fmt;

use serde_json::Value;

use super::state::PresenceState;
use crate::error::DeviceError;
use crate::models::{DeviceRecord, HomeMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    AtHome,
    Away,
    TrackingDisabled,
    StaleLocation,
    UnknownLocation,
}

impl PresenceStatus {
    fn of(device: &DeviceRecord) -> Self {
        match device.location {
            None => PresenceStatus::UnknownLocation,
            Some(_) if !device.tracking_enabled => PresenceStatus::TrackingDisabled,
            Some(loc) if loc.stale => PresenceStatus::StaleLocation,
            Some(loc) if loc.at_home => PresenceStatus::AtHome,
            Some(_) => PresenceStatus::Away,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub id: String,
    pub name: String,
    pub status: PresenceStatus,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            PresenceStatus::AtHome => write!(f, "Device '{}' at home.", self.name),
            PresenceStatus::Away => write!(f, "Device '{}' is NOT at home.", self.name),
            PresenceStatus::TrackingDisabled => {
                write!(f, "Device '{}' has tracking disabled.", self.name)
            }
            PresenceStatus::StaleLocation => write!(f, "Device '{}' has a stale location.", self.name),
            PresenceStatus::UnknownLocation => {
                write!(f, "Device '{}' has no location info.", self.name)
            }
        }
    }
}

/// A device whose `atHome` flag flipped since the previous poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceTransition {
    pub device_id: String,
    pub name: String,
    pub from: HomeMode,
    pub to: HomeMode,
}

impl fmt::Display for PresenceTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' went from {} to {}.", self.name, self.from, self.to)
    }
}

/// A record that could not be read, with the raw payload for the event log
#[derive(Debug)]
pub struct RejectedDevice {
    pub raw: Value,
    pub error: DeviceError,
}

#[derive(Debug, Default)]
pub struct Evaluation {
    /// At least one device counts as present
    pub occupied: bool,
    pub statuses: Vec<DeviceStatus>,
    pub transitions: Vec<PresenceTransition>,
    pub rejected: Vec<RejectedDevice>,
}

/// Classify every polled device, update `state`, and decide whether anyone is home.
///
/// A device is present iff tracking is enabled and its location is at home
/// and not stale. Records that fail to parse are skipped without affecting
/// the others. Devices leaving the no-location bucket have no previous
/// snapshot, so no transition is reported for them on that poll.
pub fn evaluate_occupancy(state: &mut PresenceState, devices: &[Value]) -> Evaluation {
    let mut evaluation = Evaluation::default();

    tracing::debug!("[Presence] Evaluating {} devices", devices.len());

    for raw in devices {
        let device = match DeviceRecord::from_value(raw) {
            Ok(device) => device,
            Err(error) => {
                tracing::error!("[Presence] Error while getting device info: {}", error);
                evaluation.rejected.push(RejectedDevice {
                    raw: raw.clone(),
                    error,
                });
                continue;
            }
        };

        let status = PresenceStatus::of(&device);
        let entry = DeviceStatus {
            id: device.id.clone(),
            name: device.name.clone(),
            status,
        };

        if device.location.is_none() {
            let name = device.name.clone();
            if state.record_unlocated(device) {
                tracing::warn!("[Presence] No location info for device {}", name);
            }
            evaluation.statuses.push(entry);
            continue;
        }

        tracing::info!("[Presence] {}", entry);

        if let Some(transition) = detect_transition(state, &device) {
            tracing::info!("[Presence] {}", transition);
            evaluation.transitions.push(transition);
        }

        if device.is_present() {
            evaluation.occupied = true;
        }

        state.record_located(device);
        evaluation.statuses.push(entry);
    }

    evaluation
}

fn detect_transition(state: &PresenceState, device: &DeviceRecord) -> Option<PresenceTransition> {
    if !device.tracking_enabled {
        return None;
    }

    // A snapshot taken while tracking was off carries no real atHome value
    let previous = state.previous_devices.get(&device.id)?;
    if !previous.tracking_enabled {
        return None;
    }

    let previous = previous.location?;
    let current = device.location?;

    if previous.at_home == current.at_home {
        return None;
    }

    Some(PresenceTransition {
        device_id: device.id.clone(),
        name: device.name.clone(),
        from: HomeMode::from_at_home(previous.at_home),
        to: HomeMode::from_at_home(current.at_home),
    })
}
