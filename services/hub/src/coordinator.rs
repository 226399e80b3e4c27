//! Ownership consistency coordinator
//!
//! The only component allowed to span the users and devices collections in
//! one transaction. Every multi-document procedure follows the same
//! discipline: begin, validate preconditions against the transaction
//! snapshot, write, commit. Any failure between begin and commit rolls the
//! transaction back before the error is surfaced, so no partial state (a
//! device without an owner reference, a reference to a deleted device) is
//! ever observable outside the transaction.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::{DEFAULT_GROUP, Device, NewDevice, UserAccount};
use crate::registry::{device, user};
use crate::store::StoreError;

/// Coordinator for cross-collection procedures
#[derive(Clone)]
pub struct Coordinator {
    pool: PgPool,
}

impl Coordinator {
    /// Create a new coordinator over the shared pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> HubResult<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await.map_err(StoreError::from)?)
    }

    /// Commit on success, roll back on failure; the transaction resource is
    /// consumed on every path. Precondition refusals keep their typed
    /// identity; store failures are logged and travel as a generic 500.
    async fn finish<T>(
        &self,
        tx: Transaction<'static, Postgres>,
        result: HubResult<T>,
        operation: &'static str,
    ) -> HubResult<T> {
        match result {
            Ok(value) => {
                tx.commit().await.map_err(|e| {
                    error!(operation, "transaction commit failed: {e}");
                    HubError::Store(StoreError::Database(e))
                })?;
                Ok(value)
            }
            Err(cause) => {
                if let Err(rollback_error) = tx.rollback().await {
                    error!(operation, "transaction rollback failed: {rollback_error}");
                }
                match &cause {
                    HubError::Store(store_cause) => {
                        error!(operation, "transaction aborted: {store_cause}");
                    }
                    refused => warn!(operation, "operation refused: {refused}"),
                }
                Err(cause)
            }
        }
    }

    /// Register a device for `owner`
    ///
    /// The device row and the owner's reference list are written as one
    /// atomic unit. An omitted group falls back to the default group; the
    /// group must already be declared by the owner.
    pub async fn register_device(
        &self,
        owner: Uuid,
        group: Option<String>,
        mac_address: String,
        device_name: String,
        device_type: String,
        battery: String,
    ) -> HubResult<Device> {
        let group = group.unwrap_or_else(|| DEFAULT_GROUP.to_string());

        let mut tx = self.begin().await?;
        let result = register_device_tx(
            &mut tx,
            owner,
            NewDevice {
                device_owner: owner,
                device_group: group,
                mac_address,
                device_name,
                device_type,
                battery,
            },
        )
        .await;
        self.finish(tx, result, "register_device").await
    }

    /// Remove one of the owner's devices and its ownership reference
    pub async fn deregister_device(&self, owner: Uuid, mac_address: &str) -> HubResult<()> {
        let mut tx = self.begin().await?;
        let result = deregister_device_tx(&mut tx, owner, mac_address).await;
        self.finish(tx, result, "deregister_device").await
    }

    /// Move one of the owner's devices into `group`
    ///
    /// A group the owner has not declared yet is created implicitly; this is
    /// intentional convenience, distinct from the explicit create-group path.
    pub async fn reassign_group(
        &self,
        owner: Uuid,
        mac_address: &str,
        group: &str,
    ) -> HubResult<Device> {
        let mut tx = self.begin().await?;
        let result = reassign_group_tx(&mut tx, owner, mac_address, group).await;
        self.finish(tx, result, "reassign_group").await
    }

    /// Declare a new group for the owner
    pub async fn create_group(&self, owner: Uuid, name: &str) -> HubResult<UserAccount> {
        let mut tx = self.begin().await?;
        let result = create_group_tx(&mut tx, owner, name).await;
        self.finish(tx, result, "create_group").await
    }

    /// Rename one of the owner's groups, cascading to its member devices
    pub async fn rename_group(
        &self,
        owner: Uuid,
        old_name: &str,
        new_name: &str,
    ) -> HubResult<UserAccount> {
        let mut tx = self.begin().await?;
        let result = rename_group_tx(&mut tx, owner, old_name, new_name).await;
        self.finish(tx, result, "rename_group").await
    }

    /// Delete one of the owner's groups; refused while devices reference it
    pub async fn delete_group(&self, owner: Uuid, name: &str) -> HubResult<UserAccount> {
        let mut tx = self.begin().await?;
        let result = delete_group_tx(&mut tx, owner, name).await;
        self.finish(tx, result, "delete_group").await
    }
}

async fn register_device_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    new_device: NewDevice,
) -> HubResult<Device> {
    let mut account = user::require_by_id(conn, owner).await?;
    if !account.has_group(&new_device.device_group) {
        return Err(HubError::GroupNotFound(new_device.device_group));
    }

    if device::find_by_mac(conn, &new_device.mac_address)
        .await?
        .is_some()
    {
        return Err(HubError::DuplicateDevice);
    }

    let created = device::insert(conn, &new_device).await?;
    account.push_device_ref(created.id);
    user::save_lists(conn, &account).await?;

    info!(device = %created.id, owner = %owner, "device registered");
    Ok(created)
}

async fn deregister_device_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    mac_address: &str,
) -> HubResult<()> {
    let existing = device::find_owned_by_mac(conn, owner, mac_address).await?;

    device::delete_by_id(conn, existing.id).await?;

    let mut account = user::require_by_id(conn, owner).await?;
    account.remove_device_ref(existing.id);
    user::save_lists(conn, &account).await?;

    info!(device = %existing.id, owner = %owner, "device deregistered");
    Ok(())
}

async fn reassign_group_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    mac_address: &str,
    group: &str,
) -> HubResult<Device> {
    let updated = device::set_group(conn, owner, mac_address, group).await?;

    let mut account = user::require_by_id(conn, owner).await?;
    if account.add_group_if_missing(group) {
        user::save_lists(conn, &account).await?;
        info!(owner = %owner, group, "group created implicitly by reassignment");
    }

    Ok(updated)
}

async fn create_group_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    name: &str,
) -> HubResult<UserAccount> {
    let mut account = user::require_by_id(conn, owner).await?;
    account.add_group(name)?;
    user::save_lists(conn, &account).await?;

    info!(owner = %owner, group = name, "group created");
    Ok(account)
}

async fn rename_group_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    old_name: &str,
    new_name: &str,
) -> HubResult<UserAccount> {
    let mut account = user::require_by_id(conn, owner).await?;
    account.rename_group(old_name, new_name)?;

    // Cascade before persisting the list so a failure leaves both
    // collections untouched.
    let moved = device::cascade_group_rename(conn, owner, old_name, new_name).await?;
    user::save_lists(conn, &account).await?;

    info!(owner = %owner, old_name, new_name, moved, "group renamed");
    Ok(account)
}

async fn delete_group_tx(
    conn: &mut PgConnection,
    owner: Uuid,
    name: &str,
) -> HubResult<UserAccount> {
    let members = device::list_in_group(conn, owner, name).await?;
    if !members.is_empty() {
        return Err(HubError::GroupNotEmpty(name.to_string()));
    }

    let mut account = user::require_by_id(conn, owner).await?;
    account.remove_group(name);
    user::save_lists(conn, &account).await?;

    info!(owner = %owner, group = name, "group deleted");
    Ok(account)
}
