//! Device model

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::{FieldValue, Stored};

/// Device row. `device_owner` is immutable after creation; `device_group`
/// must be a member of the owner's group list at all times.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: Uuid,
    pub device_owner: Uuid,
    pub device_group: String,
    pub mac_address: String,
    pub device_name: String,
    pub device_type: String,
    pub battery: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stored for Device {
    const TABLE: &'static str = "devices";
    const COLUMNS: &'static str = "id, device_owner, device_group, mac_address, device_name, \
         device_type, battery, created_at, updated_at";
}

/// Fields for a new device row
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub device_owner: Uuid,
    pub device_group: String,
    pub mac_address: String,
    pub device_name: String,
    pub device_type: String,
    pub battery: String,
}

/// Name/telemetry patch; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct DevicePatch {
    pub device_name: Option<String>,
    pub battery: Option<String>,
}

impl DevicePatch {
    /// Whether the patch changes anything at all
    pub fn is_empty(&self) -> bool {
        self.device_name.is_none() && self.battery.is_none()
    }

    /// Gateway change list built from the supplied fields only
    pub fn changes(&self) -> Vec<(&'static str, FieldValue)> {
        let mut changes = Vec::new();
        if let Some(device_name) = &self.device_name {
            changes.push(("device_name", FieldValue::from(device_name.clone())));
        }
        if let Some(battery) = &self.battery {
            changes.push(("battery", FieldValue::from(battery.clone())));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_builds_only_supplied_fields() {
        let patch = DevicePatch {
            device_name: Some("living room sensor".to_string()),
            battery: None,
        };
        assert!(!patch.is_empty());
        let changes = patch.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].0, "device_name");
    }

    #[test]
    fn test_empty_patch_has_no_changes() {
        let patch = DevicePatch::default();
        assert!(patch.is_empty());
        assert!(patch.changes().is_empty());
    }
}
