//! HTTP routes for the hub service

pub mod devices;
pub mod social;
pub mod users;
pub mod verify;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
};

use crate::AppState;
use crate::middleware::auth_middleware;

/// Create the router for the hub service
pub fn create_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/users/me", get(users::user_info).patch(users::update_profile))
        .route("/users/refresh", post(users::refresh_token))
        .route(
            "/users/groups",
            post(users::create_group)
                .patch(users::rename_group)
                .delete(users::delete_group),
        )
        .route(
            "/devices",
            get(devices::device_list)
                .post(devices::register_device)
                .patch(devices::update_device)
                .delete(devices::deregister_device),
        )
        .route("/devices/group", patch(devices::reassign_group))
        .route("/devices/:mac_address", get(devices::device_info))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/users/signup", post(users::signup))
        .route("/users/login", post(users::login))
        .route("/oauth/email/verify", post(verify::verify_email))
        .route("/oauth/email/check", post(verify::check_email))
        .route("/oauth/password/reset", post(verify::password_reset))
        .route("/oauth/:provider/authorize", get(social::social_authorize))
        .route("/oauth/:provider/callback", post(social::social_callback))
        .merge(authenticated)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "hub-service"
    }))
}
