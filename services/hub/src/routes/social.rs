//! Social login endpoints (Google, Naver)
//!
//! Two-step flow: the authorize step returns the provider URL and stashes
//! the CSRF state and PKCE verifier in Redis; the callback step exchanges
//! the code, fetches the profile, and logs the account in, creating it on
//! first contact.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use oauth2::PkceCodeVerifier;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::AppState;
use crate::error::HubError;
use crate::mailer::Mailer;
use crate::models::NewUser;
use crate::oauth::{OAUTH_SESSION_TTL, OAuthClient, OAuthProvider, OAuthSession};
use crate::registry;
use crate::routes::users::TokenResponse;
use crate::validation;

/// Request for the callback step
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialCallbackRequest {
    pub code: String,
    pub state: String,
}

fn provider_from_path(segment: &str) -> Result<OAuthProvider, HubError> {
    OAuthProvider::from_path(segment)
        .ok_or_else(|| HubError::Validation(format!("unknown login provider: {segment}")))
}

fn configured_client(state: &AppState, provider: OAuthProvider) -> Result<&OAuthClient, HubError> {
    state.oauth.client(provider).ok_or_else(|| {
        HubError::Internal(anyhow::anyhow!(
            "{} login is not configured",
            provider.as_str()
        ))
    })
}

fn session_key(csrf_state: &str) -> String {
    format!("oauth:{csrf_state}")
}

/// Start a social login; answers the provider authorization URL
pub async fn social_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    let provider = provider_from_path(&provider)?;
    let client = configured_client(&state, provider)?;

    let (auth_url, csrf_token, pkce_verifier) = client.generate_auth_url();

    let session = OAuthSession {
        csrf_token: csrf_token.secret().clone(),
        pkce_verifier: pkce_verifier.secret().clone(),
        provider,
    };
    let payload = serde_json::to_string(&session).map_err(|e| HubError::Internal(e.into()))?;
    state
        .redis_pool
        .set(
            &session_key(csrf_token.secret()),
            &payload,
            Some(OAUTH_SESSION_TTL),
        )
        .await
        .map_err(HubError::Internal)?;

    Ok(Json(json!({
        "authUrl": auth_url,
        "state": csrf_token.secret(),
    })))
}

/// Finish a social login; exchanges the code and signs the account in,
/// creating it on first contact
pub async fn social_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(payload): Json<SocialCallbackRequest>,
) -> Result<impl IntoResponse, HubError> {
    let provider = provider_from_path(&provider)?;
    let client = configured_client(&state, provider)?;

    let key = session_key(&payload.state);
    let Some(stored) = state.redis_pool.get(&key).await.map_err(HubError::Internal)? else {
        return Err(HubError::Unauthorized);
    };
    state.redis_pool.delete(&key).await.map_err(HubError::Internal)?;

    let session: OAuthSession =
        serde_json::from_str(&stored).map_err(|e| HubError::Internal(e.into()))?;
    if session.provider != provider {
        return Err(HubError::Unauthorized);
    }

    let access_token = client
        .exchange_code(
            payload.code,
            PkceCodeVerifier::new(session.pkce_verifier),
        )
        .await
        .map_err(|e| {
            warn!("social code exchange failed: {e}");
            HubError::Unauthorized
        })?;

    let profile = client.get_user_profile(&access_token).await.map_err(|e| {
        warn!("social profile fetch failed: {e}");
        HubError::Unauthorized
    })?;

    let email = validation::normalize_email(&profile.email);

    let mut conn = state.db_pool.acquire().await?;
    let user = match registry::user::find_by_email(&mut conn, &email).await? {
        Some(existing) => {
            if existing.login_type != provider.login_type() {
                return Err(HubError::SocialAccountMismatch(existing.login_type));
            }
            existing
        }
        None => {
            let new_user = NewUser {
                user_name: profile.name.unwrap_or_else(|| email.clone()),
                user_email: email,
                login_type: provider.login_type().to_string(),
                home_address: String::new(),
                phone_number: String::new(),
            };
            registry::user::create(&mut conn, &new_user, &Mailer::generate_temp_password()).await?
        }
    };

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
