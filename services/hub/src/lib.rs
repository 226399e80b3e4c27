//! Homelink hub service
//!
//! Device-management backend: user accounts, social login, email
//! verification, device registration, and device-group management. Durable
//! state lives in PostgreSQL; cross-collection consistency between user rows
//! and device rows is enforced by the ownership coordinator.

pub mod coordinator;
pub mod error;
pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod registry;
pub mod routes;
pub mod store;
pub mod validation;
pub mod verification;

use sqlx::PgPool;

use common::cache::RedisPool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub redis_pool: RedisPool,
    pub jwt_service: jwt::JwtService,
    pub coordinator: coordinator::Coordinator,
    pub verification: verification::VerificationStore,
    pub mailer: mailer::Mailer,
    pub oauth: oauth::OAuthRegistry,
}
