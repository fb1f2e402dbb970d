//! Process-lifetime presence state

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::DeviceRecord;

/// Owned by the poll loop and mutated once per cycle
#[derive(Debug, Clone)]
pub struct PresenceState {
    /// Last located snapshot of each device, used for transition logging
    pub previous_devices: HashMap<String, DeviceRecord>,
    /// Devices whose last poll carried no location
    pub devices_without_location: HashMap<String, DeviceRecord>,
    pub last_login: DateTime<Utc>,
    /// Set when the API rejected the session, forcing a login next cycle
    pub session_invalidated: bool,
}

impl PresenceState {
    pub fn new(last_login: DateTime<Utc>) -> Self {
        Self {
            previous_devices: HashMap::new(),
            devices_without_location: HashMap::new(),
            last_login,
            session_invalidated: false,
        }
    }

    /// Remember a device that reported a location
    pub fn record_located(&mut self, device: DeviceRecord) {
        self.devices_without_location.remove(&device.id);
        self.previous_devices.insert(device.id.clone(), device);
    }

    /// Remember a device without location. Returns true on first sighting.
    pub fn record_unlocated(&mut self, device: DeviceRecord) -> bool {
        self.previous_devices.remove(&device.id);
        self.devices_without_location
            .insert(device.id.clone(), device)
            .is_none()
    }

    /// A refresh span past the representable date range never comes due
    pub fn login_due(&self, now: DateTime<Utc>, refresh_after: chrono::Duration) -> bool {
        if self.session_invalidated {
            return true;
        }

        match self.last_login.checked_add_signed(refresh_after) {
            Some(due) => due < now,
            None => false,
        }
    }

    pub fn mark_logged_in(&mut self, now: DateTime<Utc>) {
        self.last_login = now;
        self.session_invalidated = false;
    }
}
