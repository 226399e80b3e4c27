//! Domain error taxonomy for the hub service
//!
//! Every failure a handler can surface is a variant here, and every variant
//! renders as the `{message, code}` JSON envelope with its domain status
//! code. Internal causes (store failures, bootstrap errors) are logged and
//! collapsed to a generic 500 so nothing about the storage layer leaks to
//! callers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Custom error type for the hub service
#[derive(Error, Debug)]
pub enum HubError {
    /// Malformed or missing input, rejected before any store access
    #[error("invalid input: {0}")]
    Validation(String),

    /// Email field is not shaped like an email address
    #[error("email address is malformed")]
    MailFormat,

    /// No account matches the supplied identity
    #[error("no account matches the supplied identity")]
    UserNotFound,

    /// No registered device matches the supplied MAC address for this owner
    #[error("no registered device matches the supplied MAC address")]
    DeviceNotFound,

    /// Signup against an email that already has an account
    #[error("email is already registered")]
    DuplicateEmail,

    /// A live device with this MAC address already exists somewhere
    #[error("a device with this MAC address is already registered")]
    DuplicateDevice,

    /// Group name already present in the owner's group list
    #[error("device group {0} already exists")]
    GroupAlreadyExists(String),

    /// Group name missing from the owner's group list
    #[error("device group {0} does not exist")]
    GroupNotFound(String),

    /// Group still referenced by the owner's devices; deletion refused
    #[error("device group {0} still has registered devices")]
    GroupNotEmpty(String),

    /// Supplied password does not match the stored credential
    #[error("wrong password")]
    CredentialMismatch,

    /// Missing, malformed, or expired bearer token
    #[error("authentication failed")]
    Unauthorized,

    /// Password reset requested for an unknown email
    #[error("email is not registered")]
    EmailNotRegistered,

    /// Account exists but was created through a different login provider
    #[error("account was created through {0} login")]
    SocialAccountMismatch(String),

    /// Verification code expired or was never issued
    #[error("verification code expired or missing")]
    VerificationExpired,

    /// Supplied verification code does not match the pending one
    #[error("wrong verification code")]
    VerificationMismatch,

    /// Too many wrong verification attempts; the code was invalidated
    #[error("too many verification attempts")]
    VerificationLocked,

    /// Failure inside the storage layer; transaction already rolled back
    #[error("storage failure")]
    Store(#[from] StoreError),

    /// Any other internal failure
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

/// Type alias for hub results
pub type HubResult<T> = Result<T, HubError>;

impl From<sqlx::Error> for HubError {
    fn from(error: sqlx::Error) -> Self {
        HubError::Store(StoreError::Database(error))
    }
}

impl HubError {
    /// Domain status code reported in the response envelope
    pub fn status(&self) -> StatusCode {
        match self {
            HubError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HubError::UserNotFound | HubError::DeviceNotFound => StatusCode::NOT_FOUND,
            HubError::DuplicateEmail
            | HubError::DuplicateDevice
            | HubError::GroupAlreadyExists(_) => StatusCode::CONFLICT,
            HubError::GroupNotFound(_) => StatusCode::REQUEST_TIMEOUT,
            HubError::GroupNotEmpty(_) => StatusCode::METHOD_NOT_ALLOWED,
            HubError::CredentialMismatch => StatusCode::FORBIDDEN,
            HubError::Unauthorized => StatusCode::UNAUTHORIZED,
            HubError::MailFormat
            | HubError::EmailNotRegistered
            | HubError::SocialAccountMismatch(_) => StatusCode::MISDIRECTED_REQUEST,
            HubError::VerificationExpired
            | HubError::VerificationMismatch
            | HubError::VerificationLocked => StatusCode::LOCKED,
            HubError::Store(_) | HubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {self:?}");
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "message": message,
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
