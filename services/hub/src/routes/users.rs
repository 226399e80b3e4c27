//! Account and group endpoints

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::AppState;
use crate::error::HubError;
use crate::middleware::AuthContext;
use crate::models::{LOGIN_TYPE_EMAIL, NewUser, ProfilePatch};
use crate::registry;
use crate::validation;

/// Request for account signup
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub user_name: String,
    pub user_email: String,
    pub password: String,
    pub home_address: String,
    pub phone_number: String,
}

/// Request for account login
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_email: String,
    pub password: String,
}

/// Request for token refresh
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub user_id: Uuid,
}

/// Request for a profile patch; the current password is always required
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub password: String,
    pub new_password: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub home_address: Option<String>,
    pub phone_number: Option<String>,
}

/// Request for group creation
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub group_name: String,
}

/// Request for group rename
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameGroupRequest {
    pub current_group: String,
    pub new_group_name: String,
}

/// Request for group deletion
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteGroupRequest {
    pub group_name: String,
}

/// Response carrying a fresh identity token
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub token: String,
}

/// Account signup endpoint
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_user_name(&payload.user_name).map_err(HubError::Validation)?;
    validation::validate_email(&payload.user_email).map_err(HubError::Validation)?;
    validation::validate_password(&payload.password).map_err(HubError::Validation)?;

    let new_user = NewUser {
        user_name: payload.user_name,
        user_email: validation::normalize_email(&payload.user_email),
        login_type: LOGIN_TYPE_EMAIL.to_string(),
        home_address: payload.home_address,
        phone_number: payload.phone_number,
    };

    let mut conn = state.db_pool.acquire().await?;
    let user = registry::user::create(&mut conn, &new_user, &payload.password).await?;

    let token = state
        .jwt_service
        .issue(user.id, &user.user_email)
        .map_err(HubError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user_id: user.id,
            token,
        }),
    ))
}

/// Account login endpoint
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, HubError> {
    let email = validation::normalize_email(&payload.user_email);

    let mut conn = state.db_pool.acquire().await?;
    let user = registry::user::find_by_email(&mut conn, &email)
        .await?
        .ok_or(HubError::UserNotFound)?;

    if !registry::user::verify_password(&user, &payload.password)? {
        return Err(HubError::CredentialMismatch);
    }

    let token = state
        .jwt_service
        .issue(user.id, &user.user_email)
        .map_err(HubError::Internal)?;

    Ok(Json(TokenResponse {
        user_id: user.id,
        token,
    }))
}

/// Profile read endpoint; the projection never includes the credential
pub async fn user_info(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<impl IntoResponse, HubError> {
    let mut conn = state.db_pool.acquire().await?;
    let user = registry::user::require_by_id(&mut conn, auth.owner_id).await?;

    Ok(Json(json!({ "userInfo": user.info() })))
}

/// Token refresh endpoint; the caller must present its own user id
pub async fn refresh_token(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, HubError> {
    if payload.user_id != auth.owner_id {
        return Err(HubError::Unauthorized);
    }

    let token = state
        .jwt_service
        .issue(auth.owner_id, &auth.email)
        .map_err(HubError::Internal)?;

    Ok(Json(TokenResponse {
        user_id: auth.owner_id,
        token,
    }))
}

/// Profile patch endpoint
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::require_non_empty("password", &payload.password).map_err(HubError::Validation)?;
    if let Some(user_name) = &payload.user_name {
        validation::validate_user_name(user_name).map_err(HubError::Validation)?;
    }
    if let Some(user_email) = &payload.user_email {
        validation::validate_email(user_email).map_err(HubError::Validation)?;
    }
    if let Some(new_password) = &payload.new_password {
        validation::validate_password(new_password).map_err(HubError::Validation)?;
    }
    if let Some(home_address) = &payload.home_address {
        validation::require_non_empty("homeAddress", home_address)
            .map_err(HubError::Validation)?;
    }
    if let Some(phone_number) = &payload.phone_number {
        validation::validate_phone_number(phone_number).map_err(HubError::Validation)?;
    }

    let patch = ProfilePatch {
        user_name: payload.user_name,
        user_email: payload.user_email.as_deref().map(validation::normalize_email),
        home_address: payload.home_address,
        phone_number: payload.phone_number,
        new_password: payload.new_password,
    };

    let mut conn = state.db_pool.acquire().await?;
    let user =
        registry::user::update_profile(&mut conn, auth.owner_id, &payload.password, &patch).await?;

    Ok(Json(json!({ "userInfo": user.info() })))
}

/// Group creation endpoint
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_group_name(&payload.group_name).map_err(HubError::Validation)?;

    let user = state
        .coordinator
        .create_group(auth.owner_id, &payload.group_name)
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "userInfo": user.info() }))))
}

/// Group rename endpoint; member devices follow the new name
pub async fn rename_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<RenameGroupRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_group_name(&payload.current_group).map_err(HubError::Validation)?;
    validation::validate_group_name(&payload.new_group_name).map_err(HubError::Validation)?;

    let user = state
        .coordinator
        .rename_group(auth.owner_id, &payload.current_group, &payload.new_group_name)
        .await?;

    Ok(Json(json!({ "userInfo": user.info() })))
}

/// Group deletion endpoint; refused while devices reference the group
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<DeleteGroupRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_group_name(&payload.group_name).map_err(HubError::Validation)?;

    let user = state
        .coordinator
        .delete_group(auth.owner_id, &payload.group_name)
        .await?;

    Ok(Json(json!({ "userInfo": user.info() })))
}
