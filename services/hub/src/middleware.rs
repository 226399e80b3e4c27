//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;
use uuid::Uuid;

use crate::AppState;
use crate::error::HubError;

/// Verified identity attached to every authenticated request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub owner_id: Uuid,
    pub email: String,
}

/// Extract and validate the bearer token, then attach the verified identity
/// to the request extensions for handlers to read
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HubError> {
    let TypedHeader(authorization) = bearer.ok_or(HubError::Unauthorized)?;

    let claims = state
        .jwt_service
        .validate(authorization.token())
        .map_err(|e| {
            warn!("token validation failed: {e}");
            HubError::Unauthorized
        })?;

    req.extensions_mut().insert(AuthContext {
        owner_id: claims.sub,
        email: claims.email,
    });

    Ok(next.run(req).await)
}
