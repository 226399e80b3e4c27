//! User account model and the ownership-list operations
//!
//! A user row carries the two owned collections the consistency protocol
//! maintains: `device_refs` (ids of owned devices) and `group_names` (the
//! group strings the owner's devices may reference). The list mutations live
//! here as pure methods so their invariants hold independently of storage:
//! no duplicate group names, no duplicate device refs, membership checks
//! before writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::HubError;
use crate::store::Stored;

/// Group every account starts with
pub const DEFAULT_GROUP: &str = "default_group";

/// Login type of accounts created through email signup
pub const LOGIN_TYPE_EMAIL: &str = "Email";

/// User account row
#[derive(Debug, Clone, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub user_name: String,
    pub user_email: String,
    pub password_hash: String,
    pub login_type: String,
    pub home_address: String,
    pub phone_number: String,
    pub device_refs: Vec<Uuid>,
    pub group_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stored for UserAccount {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, user_name, user_email, password_hash, login_type, \
         home_address, phone_number, device_refs, group_names, created_at, updated_at";
}

impl UserAccount {
    /// Whether `name` is one of this owner's groups
    pub fn has_group(&self, name: &str) -> bool {
        self.group_names.iter().any(|group| group == name)
    }

    /// Append a new group name; duplicates are refused
    pub fn add_group(&mut self, name: &str) -> Result<(), HubError> {
        if self.has_group(name) {
            return Err(HubError::GroupAlreadyExists(name.to_string()));
        }
        self.group_names.push(name.to_string());
        Ok(())
    }

    /// Append a group name unless present; reports whether the list changed
    pub fn add_group_if_missing(&mut self, name: &str) -> bool {
        if self.has_group(name) {
            return false;
        }
        self.group_names.push(name.to_string());
        true
    }

    /// Replace `old` with `new`, keeping the list duplicate-free
    pub fn rename_group(&mut self, old: &str, new: &str) -> Result<(), HubError> {
        if self.has_group(new) {
            return Err(HubError::GroupAlreadyExists(new.to_string()));
        }
        if !self.has_group(old) {
            return Err(HubError::GroupNotFound(old.to_string()));
        }
        self.group_names.retain(|group| group != old);
        self.group_names.push(new.to_string());
        Ok(())
    }

    /// Drop a group name; an absent name is a no-op
    pub fn remove_group(&mut self, name: &str) {
        self.group_names.retain(|group| group != name);
    }

    /// Record ownership of a device; already-referenced ids are not doubled
    pub fn push_device_ref(&mut self, id: Uuid) {
        if !self.device_refs.contains(&id) {
            self.device_refs.push(id);
        }
    }

    /// Drop the reference to a device
    pub fn remove_device_ref(&mut self, id: Uuid) {
        self.device_refs.retain(|device_ref| *device_ref != id);
    }

    /// Caller-facing projection; never carries the password hash
    pub fn info(&self) -> UserInfo {
        UserInfo {
            user_name: self.user_name.clone(),
            user_email: self.user_email.clone(),
            home_address: self.home_address.clone(),
            phone_number: self.phone_number.clone(),
            device_refs: self.device_refs.clone(),
            group_names: self.group_names.clone(),
        }
    }
}

/// New account payload; the registry hashes the credential
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub user_name: String,
    pub user_email: String,
    pub login_type: String,
    pub home_address: String,
    pub phone_number: String,
}

/// Profile patch; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub home_address: Option<String>,
    pub phone_number: Option<String>,
    pub new_password: Option<String>,
}

/// User projection returned to callers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_name: String,
    pub user_email: String,
    pub home_address: String,
    pub phone_number: String,
    pub device_refs: Vec<Uuid>,
    pub group_names: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            user_name: "Jamie Park".to_string(),
            user_email: "jamie@example.com".to_string(),
            password_hash: "argon2-hash".to_string(),
            login_type: LOGIN_TYPE_EMAIL.to_string(),
            home_address: "12 Maple Lane".to_string(),
            phone_number: "010-1234-5678".to_string(),
            device_refs: Vec::new(),
            group_names: vec![DEFAULT_GROUP.to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_group_refuses_duplicates() {
        let mut user = account();
        user.add_group("garage").unwrap();
        let err = user.add_group("garage").unwrap_err();
        assert!(matches!(err, HubError::GroupAlreadyExists(name) if name == "garage"));
        assert_eq!(user.group_names, vec![DEFAULT_GROUP, "garage"]);
    }

    #[test]
    fn test_add_group_if_missing_reports_change() {
        let mut user = account();
        assert!(user.add_group_if_missing("garage"));
        assert!(!user.add_group_if_missing("garage"));
        assert_eq!(user.group_names.len(), 2);
    }

    #[test]
    fn test_rename_group_replaces_entry() {
        let mut user = account();
        user.add_group("garage").unwrap();
        user.rename_group("garage", "carport").unwrap();
        assert!(user.has_group("carport"));
        assert!(!user.has_group("garage"));
    }

    #[test]
    fn test_rename_group_refuses_existing_target() {
        let mut user = account();
        user.add_group("garage").unwrap();
        let err = user.rename_group("garage", DEFAULT_GROUP).unwrap_err();
        assert!(matches!(err, HubError::GroupAlreadyExists(_)));
    }

    #[test]
    fn test_rename_group_requires_source() {
        let mut user = account();
        let err = user.rename_group("garage", "carport").unwrap_err();
        assert!(matches!(err, HubError::GroupNotFound(name) if name == "garage"));
    }

    #[test]
    fn test_remove_group_is_idempotent() {
        let mut user = account();
        user.add_group("garage").unwrap();
        user.remove_group("garage");
        user.remove_group("garage");
        assert_eq!(user.group_names, vec![DEFAULT_GROUP]);
    }

    #[test]
    fn test_device_refs_stay_unique() {
        let mut user = account();
        let id = Uuid::new_v4();
        user.push_device_ref(id);
        user.push_device_ref(id);
        assert_eq!(user.device_refs, vec![id]);

        user.remove_device_ref(id);
        assert!(user.device_refs.is_empty());
        user.remove_device_ref(id);
        assert!(user.device_refs.is_empty());
    }

    #[test]
    fn test_info_projection_has_no_credential() {
        let user = account();
        let info = user.info();
        let rendered = serde_json::to_string(&info).unwrap();
        assert!(!rendered.contains("argon2-hash"));
        assert!(!rendered.contains("password"));
        assert!(rendered.contains("\"groupNames\""));
        assert!(rendered.contains("\"deviceRefs\""));
    }
}
