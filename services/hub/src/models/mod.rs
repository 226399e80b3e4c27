//! Data model for the hub service

pub mod device;
pub mod user;

// Re-export for convenience
pub use device::{Device, DevicePatch, NewDevice};
pub use user::{DEFAULT_GROUP, LOGIN_TYPE_EMAIL, NewUser, ProfilePatch, UserAccount, UserInfo};
