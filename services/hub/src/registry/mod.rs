//! Registries owning the two collections
//!
//! Each registry is the only writer of its collection. Operations take the
//! caller's connection so the coordinator can thread one transaction through
//! both registries; handlers pass a plain pool connection for single-document
//! operations.

pub mod device;
pub mod user;
