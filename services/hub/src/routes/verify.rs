//! Pre-signup email verification and password reset endpoints

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::AppState;
use crate::error::HubError;
use crate::mailer::Mailer;
use crate::registry;
use crate::validation;

/// Request carrying only an email address
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub user_email: String,
}

/// Request for checking a verification pin
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckEmailRequest {
    pub user_email: String,
    pub pin_code: String,
}

/// Issue a verification pin for a not-yet-registered email
pub async fn verify_email(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_email(&payload.user_email).map_err(|_| HubError::MailFormat)?;
    let email = validation::normalize_email(&payload.user_email);

    let mut conn = state.db_pool.acquire().await?;
    if registry::user::find_by_email(&mut conn, &email)
        .await?
        .is_some()
    {
        return Err(HubError::DuplicateEmail);
    }

    let pin_code = Mailer::generate_pin_code();
    state.verification.issue(&email, &pin_code).await?;

    // Delivery failures are logged; the pending code stays valid and the
    // client may request a fresh one.
    if let Err(e) = state.mailer.send_verification_code(&email, &pin_code).await {
        error!("verification mail delivery failed: {e}");
    }

    Ok((StatusCode::CREATED, Json(json!({}))))
}

/// Check a verification pin
pub async fn check_email(
    State(state): State<AppState>,
    Json(payload): Json<CheckEmailRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_email(&payload.user_email).map_err(|_| HubError::MailFormat)?;
    let email = validation::normalize_email(&payload.user_email);

    state.verification.check(&email, &payload.pin_code).await?;

    Ok((StatusCode::CREATED, Json(json!({}))))
}

/// Reset the password of a registered email to a mailed temp password
pub async fn password_reset(
    State(state): State<AppState>,
    Json(payload): Json<EmailRequest>,
) -> Result<impl IntoResponse, HubError> {
    validation::validate_email(&payload.user_email).map_err(|_| HubError::MailFormat)?;
    let email = validation::normalize_email(&payload.user_email);

    let mut conn = state.db_pool.acquire().await?;
    if registry::user::find_by_email(&mut conn, &email)
        .await?
        .is_none()
    {
        return Err(HubError::EmailNotRegistered);
    }

    let temp_password = Mailer::generate_temp_password();
    registry::user::set_password_by_email(&mut conn, &email, &temp_password).await?;

    if let Err(e) = state.mailer.send_password_reset(&email, &temp_password).await {
        error!("password reset mail delivery failed: {e}");
    }

    Ok((StatusCode::CREATED, Json(json!({}))))
}
