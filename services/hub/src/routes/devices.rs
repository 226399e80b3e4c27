//! Device endpoints
//!
//! Reads go straight to the device registry over a pool connection; every
//! mutation that touches both collections goes through the coordinator.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::error::HubError;
use crate::middleware::AuthContext;
use crate::models::DevicePatch;
use crate::registry;
use crate::validation;

/// Request for device registration
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_group: Option<String>,
    pub mac_address: String,
    pub device_name: String,
    pub device_type: String,
    pub battery: String,
}

/// Request for device deregistration
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeregisterDeviceRequest {
    pub mac_address: String,
}

/// Request for a device name/telemetry patch
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceRequest {
    pub mac_address: String,
    pub device_name: Option<String>,
    pub battery: Option<String>,
}

/// Request for moving a device between groups
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignGroupRequest {
    pub mac_address: String,
    pub device_group: String,
}

/// Response for partial-update endpoints
#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

/// List every device owned by the caller
pub async fn device_list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, HubError> {
    let mut conn = state.db_pool.acquire().await?;
    let devices = registry::device::list_for_owner(&mut conn, auth.owner_id).await?;

    Ok(Json(json!({ "devices": devices })))
}

/// Read a single owned device by MAC address
pub async fn device_info(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(mac_address): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_mac_address(&mac_address).map_err(HubError::Validation)?;

    let mut conn = state.db_pool.acquire().await?;
    let device = registry::device::find_owned_by_mac(&mut conn, auth.owner_id, &mac_address).await?;

    Ok(Json(json!({ "device": device })))
}

/// Register a new device for the caller
pub async fn register_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RegisterDeviceRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_mac_address(&payload.mac_address).map_err(HubError::Validation)?;
    if let Some(device_group) = &payload.device_group {
        validation::validate_group_name(device_group).map_err(HubError::Validation)?;
    }
    validation::require_non_empty("deviceName", &payload.device_name)
        .map_err(HubError::Validation)?;
    validation::require_non_empty("deviceType", &payload.device_type)
        .map_err(HubError::Validation)?;
    validation::require_non_empty("battery", &payload.battery).map_err(HubError::Validation)?;

    let device = state
        .coordinator
        .register_device(
            auth.owner_id,
            payload.device_group,
            payload.mac_address,
            payload.device_name,
            payload.device_type,
            payload.battery,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "device": device }))))
}

/// Deregister one of the caller's devices
pub async fn deregister_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<DeregisterDeviceRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_mac_address(&payload.mac_address).map_err(HubError::Validation)?;

    state
        .coordinator
        .deregister_device(auth.owner_id, &payload.mac_address)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "device deregistered" })),
    ))
}

/// Patch name/battery of one of the caller's devices
pub async fn update_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateDeviceRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_mac_address(&payload.mac_address).map_err(HubError::Validation)?;
    if let Some(device_name) = &payload.device_name {
        validation::require_non_empty("deviceName", device_name).map_err(HubError::Validation)?;
    }
    if let Some(battery) = &payload.battery {
        validation::require_non_empty("battery", battery).map_err(HubError::Validation)?;
    }

    let patch = DevicePatch {
        device_name: payload.device_name,
        battery: payload.battery,
    };

    let mut conn = state.db_pool.acquire().await?;
    registry::device::apply_patch(&mut conn, auth.owner_id, &payload.mac_address, &patch).await?;

    Ok(Json(UpdatedResponse { updated: true }))
}

/// Move one of the caller's devices into another group
pub async fn reassign_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<ReassignGroupRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_mac_address(&payload.mac_address).map_err(HubError::Validation)?;
    validation::validate_group_name(&payload.device_group).map_err(HubError::Validation)?;

    state
        .coordinator
        .reassign_group(auth.owner_id, &payload.mac_address, &payload.device_group)
        .await?;

    Ok(Json(UpdatedResponse { updated: true }))
}
