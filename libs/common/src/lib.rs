//! Common library for the Homelink device-management backend
//!
//! This crate provides the infrastructure shared by the Homelink services:
//! PostgreSQL connection pooling, the Redis cache used for short-lived
//! verification state, and the common error types.

pub mod cache;
pub mod database;
pub mod error;
