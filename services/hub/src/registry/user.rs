//! User/group registry
//!
//! Owns the user collection: account creation, credential handling, profile
//! patches, and persistence of the two owned lists after the pure mutations
//! on `UserAccount`.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::error::{HubError, HubResult};
use crate::models::{DEFAULT_GROUP, NewUser, ProfilePatch, UserAccount};
use crate::store::{self, FieldValue, StoreError};

const ID_FIELD: &str = "id";
const EMAIL_FIELD: &str = "user_email";

/// Find an account by id
pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> HubResult<Option<UserAccount>> {
    Ok(store::find_one_by(conn, ID_FIELD, &FieldValue::Id(id)).await?)
}

/// Find an account by normalized email
pub async fn find_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> HubResult<Option<UserAccount>> {
    Ok(store::find_one_by(conn, EMAIL_FIELD, &FieldValue::from(email)).await?)
}

/// Find an account by id or fail
pub async fn require_by_id(conn: &mut PgConnection, id: Uuid) -> HubResult<UserAccount> {
    find_by_id(conn, id).await?.ok_or(HubError::UserNotFound)
}

/// Create a new account with a freshly hashed credential
///
/// The group list is seeded with the default group; the device list starts
/// empty. Email uniqueness is checked here and backstopped by the unique
/// index for concurrent signups.
pub async fn create(
    conn: &mut PgConnection,
    new_user: &NewUser,
    password: &str,
) -> HubResult<UserAccount> {
    if find_by_email(conn, &new_user.user_email).await?.is_some() {
        return Err(HubError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;

    let fields = [
        ("user_name", FieldValue::from(new_user.user_name.clone())),
        ("user_email", FieldValue::from(new_user.user_email.clone())),
        ("password_hash", FieldValue::from(password_hash)),
        ("login_type", FieldValue::from(new_user.login_type.clone())),
        ("home_address", FieldValue::from(new_user.home_address.clone())),
        ("phone_number", FieldValue::from(new_user.phone_number.clone())),
        ("device_refs", FieldValue::IdList(Vec::new())),
        (
            "group_names",
            FieldValue::TextList(vec![DEFAULT_GROUP.to_string()]),
        ),
    ];

    let user: UserAccount = match store::insert_one(conn, &fields).await {
        Ok(user) => user,
        Err(error) if store::is_unique_violation(&error) => return Err(HubError::DuplicateEmail),
        Err(error) => return Err(error.into()),
    };

    info!(user = %user.id, "account created");
    Ok(user)
}

/// Persist the two owned lists after in-memory mutation
pub async fn save_lists(conn: &mut PgConnection, user: &UserAccount) -> HubResult<()> {
    let changes = [
        ("device_refs", FieldValue::IdList(user.device_refs.clone())),
        ("group_names", FieldValue::TextList(user.group_names.clone())),
    ];

    match store::update_one_by::<UserAccount>(conn, ID_FIELD, &FieldValue::Id(user.id), &changes)
        .await
    {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound { .. }) => Err(HubError::UserNotFound),
        Err(error) => Err(error.into()),
    }
}

/// Verify the current credential, then apply the profile patch
///
/// A new credential is re-hashed only when it actually differs from the
/// current one.
pub async fn update_profile(
    conn: &mut PgConnection,
    id: Uuid,
    current_password: &str,
    patch: &ProfilePatch,
) -> HubResult<UserAccount> {
    let user = require_by_id(conn, id).await?;
    if !verify_password(&user, current_password)? {
        return Err(HubError::CredentialMismatch);
    }

    let mut changes: Vec<(&'static str, FieldValue)> = Vec::new();
    if let Some(user_name) = &patch.user_name {
        changes.push(("user_name", FieldValue::from(user_name.clone())));
    }
    if let Some(user_email) = &patch.user_email {
        changes.push(("user_email", FieldValue::from(user_email.clone())));
    }
    if let Some(home_address) = &patch.home_address {
        changes.push(("home_address", FieldValue::from(home_address.clone())));
    }
    if let Some(phone_number) = &patch.phone_number {
        changes.push(("phone_number", FieldValue::from(phone_number.clone())));
    }
    if let Some(new_password) = &patch.new_password {
        if !verify_password(&user, new_password)? {
            changes.push(("password_hash", FieldValue::from(hash_password(new_password)?)));
        }
    }

    if changes.is_empty() {
        return Ok(user);
    }

    match store::update_one_by(conn, ID_FIELD, &FieldValue::Id(id), &changes).await {
        Ok(updated) => Ok(updated),
        Err(StoreError::NotFound { .. }) => Err(HubError::UserNotFound),
        Err(error) => Err(error.into()),
    }
}

/// Replace the credential of the account behind `email` (reset flow)
pub async fn set_password_by_email(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
) -> HubResult<UserAccount> {
    let changes = [("password_hash", FieldValue::from(hash_password(password)?))];

    match store::update_one_by(conn, EMAIL_FIELD, &FieldValue::from(email), &changes).await {
        Ok(updated) => Ok(updated),
        Err(StoreError::NotFound { .. }) => Err(HubError::EmailNotRegistered),
        Err(error) => Err(error.into()),
    }
}

/// Hash a credential with a fresh salt
pub fn hash_password(password: &str) -> HubResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| HubError::Internal(anyhow::anyhow!("failed to hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Check a supplied credential against the stored hash
pub fn verify_password(user: &UserAccount, password: &str) -> HubResult<bool> {
    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| HubError::Internal(anyhow::anyhow!("failed to parse password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.trim().as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::LOGIN_TYPE_EMAIL;

    fn account_with_hash(password_hash: String) -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            user_name: "Jamie Park".to_string(),
            user_email: "jamie@example.com".to_string(),
            password_hash,
            login_type: LOGIN_TYPE_EMAIL.to_string(),
            home_address: String::new(),
            phone_number: String::new(),
            device_refs: Vec::new(),
            group_names: vec![DEFAULT_GROUP.to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("Secret123").unwrap();
        let user = account_with_hash(hash);

        assert!(verify_password(&user, "Secret123").unwrap());
        assert!(!verify_password(&user, "Secret124").unwrap());
    }

    #[test]
    fn test_verify_trims_surrounding_whitespace() {
        let hash = hash_password("Secret123").unwrap();
        let user = account_with_hash(hash);

        assert!(verify_password(&user, " Secret123 ").unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("Secret123").unwrap();
        let second = hash_password("Secret123").unwrap();
        assert_ne!(first, second);
    }
}
