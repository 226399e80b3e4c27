//! Device registry
//!
//! Owns the device lifecycle: lookup, insert, patch, group rewrite, delete.
//! Only this module mutates device rows; the coordinator combines these
//! operations with user-side writes when a procedure spans both collections.

use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::{Device, DevicePatch, NewDevice};
use crate::store::{self, FieldValue, StoreError};

const ID_FIELD: &str = "id";
const MAC_FIELD: &str = "mac_address";
const OWNER_FIELD: &str = "device_owner";
const GROUP_FIELD: &str = "device_group";

/// All devices owned by `owner`; an empty result is not an error
pub async fn list_for_owner(conn: &mut PgConnection, owner: Uuid) -> HubResult<Vec<Device>> {
    Ok(store::find_all_by(conn, OWNER_FIELD, &FieldValue::Id(owner)).await?)
}

/// Single device by MAC address, regardless of owner
pub async fn find_by_mac(conn: &mut PgConnection, mac_address: &str) -> HubResult<Option<Device>> {
    Ok(store::find_one_by(conn, MAC_FIELD, &FieldValue::from(mac_address)).await?)
}

/// Single device by MAC address, visible only to its owner
///
/// A device registered to somebody else answers the same way as a missing
/// one, so MAC probing reveals nothing across accounts.
pub async fn find_owned_by_mac(
    conn: &mut PgConnection,
    owner: Uuid,
    mac_address: &str,
) -> HubResult<Device> {
    match find_by_mac(conn, mac_address).await? {
        Some(device) if device.device_owner == owner => Ok(device),
        _ => Err(HubError::DeviceNotFound),
    }
}

/// The owner's devices still referencing `group`
pub async fn list_in_group(
    conn: &mut PgConnection,
    owner: Uuid,
    group: &str,
) -> HubResult<Vec<Device>> {
    let devices: Vec<Device> =
        store::find_all_by(conn, GROUP_FIELD, &FieldValue::from(group)).await?;
    Ok(devices
        .into_iter()
        .filter(|device| device.device_owner == owner)
        .collect())
}

/// Insert a new device row
///
/// The unique MAC index backstops two concurrent registrations that both
/// passed the duplicate check inside their own snapshots.
pub async fn insert(conn: &mut PgConnection, new_device: &NewDevice) -> HubResult<Device> {
    let fields = [
        (OWNER_FIELD, FieldValue::Id(new_device.device_owner)),
        (GROUP_FIELD, FieldValue::from(new_device.device_group.clone())),
        (MAC_FIELD, FieldValue::from(new_device.mac_address.clone())),
        ("device_name", FieldValue::from(new_device.device_name.clone())),
        ("device_type", FieldValue::from(new_device.device_type.clone())),
        ("battery", FieldValue::from(new_device.battery.clone())),
    ];

    match store::insert_one(conn, &fields).await {
        Ok(device) => Ok(device),
        Err(error) if store::is_unique_violation(&error) => Err(HubError::DuplicateDevice),
        Err(error) => Err(error.into()),
    }
}

/// Patch name/battery of one of the owner's devices
pub async fn apply_patch(
    conn: &mut PgConnection,
    owner: Uuid,
    mac_address: &str,
    patch: &DevicePatch,
) -> HubResult<Device> {
    let device = find_owned_by_mac(conn, owner, mac_address).await?;
    if patch.is_empty() {
        return Ok(device);
    }

    debug!(mac_address, "applying device patch");
    match store::update_one_by(conn, MAC_FIELD, &FieldValue::from(mac_address), &patch.changes())
        .await
    {
        Ok(updated) => Ok(updated),
        Err(StoreError::NotFound { .. }) => Err(HubError::DeviceNotFound),
        Err(error) => Err(error.into()),
    }
}

/// Rewrite the group of one of the owner's devices
pub async fn set_group(
    conn: &mut PgConnection,
    owner: Uuid,
    mac_address: &str,
    group: &str,
) -> HubResult<Device> {
    find_owned_by_mac(conn, owner, mac_address).await?;

    let changes = [(GROUP_FIELD, FieldValue::from(group))];
    match store::update_one_by(conn, MAC_FIELD, &FieldValue::from(mac_address), &changes).await {
        Ok(updated) => Ok(updated),
        Err(StoreError::NotFound { .. }) => Err(HubError::DeviceNotFound),
        Err(error) => Err(error.into()),
    }
}

/// Move every owner device from group `old` to `new` (rename cascade);
/// reports how many rows moved
pub async fn cascade_group_rename(
    conn: &mut PgConnection,
    owner: Uuid,
    old: &str,
    new: &str,
) -> HubResult<u64> {
    // Two-field targeting; the single-field gateway covers unique-key
    // operations, so this statement lives with the registry.
    let result = sqlx::query(
        "UPDATE devices SET device_group = $3, updated_at = now() \
         WHERE device_owner = $1 AND device_group = $2",
    )
    .bind(owner)
    .bind(old)
    .bind(new)
    .execute(conn)
    .await
    .map_err(StoreError::from)?;

    Ok(result.rows_affected())
}

/// Delete a device row by id
pub async fn delete_by_id(conn: &mut PgConnection, id: Uuid) -> HubResult<()> {
    match store::delete_one_by::<Device>(conn, ID_FIELD, &FieldValue::Id(id)).await {
        Ok(()) => Ok(()),
        Err(StoreError::NotFound { .. }) => Err(HubError::DeviceNotFound),
        Err(error) => Err(error.into()),
    }
}
