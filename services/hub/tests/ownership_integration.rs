//! Integration tests for the ownership consistency protocol
//!
//! These tests exercise the coordinator against a real PostgreSQL instance
//! and only run with `--features integration-tests`. Every test creates its
//! own owner account and MAC addresses, so the suite is safe to run in
//! parallel against a shared database.

use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use common::database::{DatabaseConfig, init_pool};
use hub::coordinator::Coordinator;
use hub::error::HubError;
use hub::models::{DEFAULT_GROUP, LOGIN_TYPE_EMAIL, NewUser, UserAccount};
use hub::registry::{device, user};

async fn setup_pool() -> PgPool {
    let config = DatabaseConfig::from_env().expect("database config");
    let pool = init_pool(&config).await.expect("database pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    pool
}

async fn create_owner(pool: &PgPool) -> UserAccount {
    let mut conn = pool.acquire().await.expect("connection");
    let new_user = NewUser {
        user_name: "Test Owner".to_string(),
        user_email: format!("owner-{}@example.com", Uuid::new_v4()),
        login_type: LOGIN_TYPE_EMAIL.to_string(),
        home_address: "12 Maple Lane".to_string(),
        phone_number: "010-1234-5678".to_string(),
    };
    user::create(&mut conn, &new_user, "Passw0rd")
        .await
        .expect("owner account")
}

async fn reload(pool: &PgPool, id: Uuid) -> UserAccount {
    let mut conn = pool.acquire().await.expect("connection");
    user::require_by_id(&mut conn, id).await.expect("owner row")
}

fn unique_mac() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
    )
}

/// `d.id ∈ u.device_refs ⟺ d.device_owner == u.id`, and every referenced
/// group is declared by the owner.
async fn assert_ownership_invariant(pool: &PgPool, owner_id: Uuid) {
    let mut conn = pool.acquire().await.expect("connection");
    let owner = user::require_by_id(&mut conn, owner_id).await.expect("owner row");
    let devices = device::list_for_owner(&mut conn, owner_id)
        .await
        .expect("device list");

    let device_ids: HashSet<Uuid> = devices.iter().map(|d| d.id).collect();
    let refs: HashSet<Uuid> = owner.device_refs.iter().copied().collect();
    assert_eq!(device_ids, refs, "device refs out of sync with device rows");

    for dev in &devices {
        assert!(
            owner.has_group(&dev.device_group),
            "device group {} not declared by owner",
            dev.device_group
        );
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_register_creates_device_and_reference() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    let created = coordinator
        .register_device(
            owner.id,
            None,
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    assert_eq!(created.device_owner, owner.id);
    assert_eq!(created.device_group, DEFAULT_GROUP);
    assert_eq!(created.mac_address, mac);

    let owner_after = reload(&pool, owner.id).await;
    assert!(owner_after.device_refs.contains(&created.id));
    assert_ownership_invariant(&pool, owner.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_duplicate_mac_is_refused_without_side_effects() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let intruder = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    coordinator
        .register_device(
            owner.id,
            None,
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("first registration");

    // The MAC is a global uniqueness key, so a second registration is
    // refused even for a different owner, and nothing changes.
    let refused = coordinator
        .register_device(
            intruder.id,
            None,
            mac.clone(),
            "Copycat".to_string(),
            "sensor".to_string(),
            "50".to_string(),
        )
        .await;
    assert!(matches!(refused, Err(HubError::DuplicateDevice)));

    let owner_after = reload(&pool, owner.id).await;
    let intruder_after = reload(&pool, intruder.id).await;
    assert_eq!(owner_after.device_refs.len(), 1);
    assert!(intruder_after.device_refs.is_empty());
    assert_ownership_invariant(&pool, owner.id).await;
    assert_ownership_invariant(&pool, intruder.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_register_into_undeclared_group_is_refused() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    let refused = coordinator
        .register_device(
            owner.id,
            Some("attic".to_string()),
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await;
    assert!(matches!(refused, Err(HubError::GroupNotFound(name)) if name == "attic"));

    let mut conn = pool.acquire().await.expect("connection");
    assert!(device::find_by_mac(&mut conn, &mac).await.expect("lookup").is_none());
    assert!(reload(&pool, owner.id).await.device_refs.is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_delete_group_with_devices_is_refused() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());

    coordinator
        .create_group(owner.id, "living_room")
        .await
        .expect("group creation");
    coordinator
        .register_device(
            owner.id,
            Some("living_room".to_string()),
            unique_mac(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    let refused = coordinator.delete_group(owner.id, "living_room").await;
    assert!(matches!(refused, Err(HubError::GroupNotEmpty(name)) if name == "living_room"));

    let owner_after = reload(&pool, owner.id).await;
    assert!(owner_after.has_group("living_room"));
    assert_ownership_invariant(&pool, owner.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_deregister_removes_device_and_reference() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    let created = coordinator
        .register_device(
            owner.id,
            None,
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    coordinator
        .deregister_device(owner.id, &mac)
        .await
        .expect("deregistration");

    let mut conn = pool.acquire().await.expect("connection");
    assert!(device::find_by_mac(&mut conn, &mac).await.expect("lookup").is_none());

    let owner_after = reload(&pool, owner.id).await;
    assert!(!owner_after.device_refs.contains(&created.id));
    assert_ownership_invariant(&pool, owner.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_reassign_to_new_group_declares_it() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    coordinator
        .register_device(
            owner.id,
            None,
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    let moved = coordinator
        .reassign_group(owner.id, &mac, "garage")
        .await
        .expect("reassignment");
    assert_eq!(moved.device_group, "garage");

    let owner_after = reload(&pool, owner.id).await;
    assert!(owner_after.has_group("garage"));
    assert_ownership_invariant(&pool, owner.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_aborted_deregister_leaves_device_intact() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    coordinator
        .register_device(
            owner.id,
            None,
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    // Force the user-side step to fail after the device-side delete: drop
    // the owner row out from under the transaction.
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(owner.id)
        .execute(&pool)
        .await
        .expect("owner removal");

    let aborted = coordinator.deregister_device(owner.id, &mac).await;
    assert!(matches!(aborted, Err(HubError::UserNotFound)));

    // The transaction rolled back, so the device-side delete never became
    // durable.
    let mut conn = pool.acquire().await.expect("connection");
    assert!(device::find_by_mac(&mut conn, &mac).await.expect("lookup").is_some());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_rename_group_cascades_to_devices() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());
    let mac = unique_mac();

    coordinator
        .create_group(owner.id, "den")
        .await
        .expect("group creation");
    coordinator
        .register_device(
            owner.id,
            Some("den".to_string()),
            mac.clone(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    coordinator
        .rename_group(owner.id, "den", "study")
        .await
        .expect("rename");

    let owner_after = reload(&pool, owner.id).await;
    assert!(owner_after.has_group("study"));
    assert!(!owner_after.has_group("den"));

    let mut conn = pool.acquire().await.expect("connection");
    let moved = device::find_by_mac(&mut conn, &mac)
        .await
        .expect("lookup")
        .expect("device row");
    assert_eq!(moved.device_group, "study");
    assert_ownership_invariant(&pool, owner.id).await;
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_delete_absent_group_is_a_noop() {
    let pool = setup_pool().await;
    let owner = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());

    let after = coordinator
        .delete_group(owner.id, "ghost")
        .await
        .expect("deletion");
    assert_eq!(after.group_names, vec![DEFAULT_GROUP.to_string()]);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_group_emptiness_check_is_owner_scoped() {
    let pool = setup_pool().await;
    let first = create_owner(&pool).await;
    let second = create_owner(&pool).await;
    let coordinator = Coordinator::new(pool.clone());

    // Both owners declare the same group name; only the second one has a
    // device in it.
    coordinator
        .create_group(first.id, "patio")
        .await
        .expect("first group");
    coordinator
        .create_group(second.id, "patio")
        .await
        .expect("second group");
    coordinator
        .register_device(
            second.id,
            Some("patio".to_string()),
            unique_mac(),
            "Air Sensor".to_string(),
            "sensor".to_string(),
            "88".to_string(),
        )
        .await
        .expect("registration");

    // The second owner's device must not block the first owner's deletion.
    coordinator
        .delete_group(first.id, "patio")
        .await
        .expect("deletion");

    let second_after = reload(&pool, second.id).await;
    assert!(second_after.has_group("patio"));
    assert_ownership_invariant(&pool, second.id).await;
}
