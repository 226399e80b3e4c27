//! Email verification codes
//!
//! Six-digit pin codes cached per email with a five-minute TTL and a
//! five-attempt lockout. This state lives in Redis, deliberately outside the
//! store's transactional boundary; entries expire autonomously.

use serde::{Deserialize, Serialize};

use common::cache::RedisPool;

use crate::error::{HubError, HubResult};

/// Seconds a pending code stays valid
pub const CODE_TTL_SECONDS: u64 = 300;

/// Wrong attempts before the pending code is invalidated
pub const MAX_ATTEMPTS: u32 = 5;

/// Cached verification state for one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub pin_code: String,
    pub attempts: u32,
}

/// Outcome of checking a supplied pin against a cached entry
#[derive(Debug, PartialEq)]
pub enum CodeCheck {
    /// Pin matched; the entry must be dropped
    Accepted,
    /// Pin wrong; the entry must be re-cached with the bumped counter
    Rejected(CodeEntry),
    /// Pin wrong for the final time; the entry must be dropped
    LockedOut,
}

impl CodeEntry {
    /// Fresh entry with no failed attempts
    pub fn new(pin_code: String) -> Self {
        Self {
            pin_code,
            attempts: 0,
        }
    }

    /// Pure decision step of the check flow
    pub fn evaluate(mut self, supplied: &str) -> CodeCheck {
        if self.pin_code == supplied {
            return CodeCheck::Accepted;
        }

        self.attempts += 1;
        if self.attempts >= MAX_ATTEMPTS {
            CodeCheck::LockedOut
        } else {
            CodeCheck::Rejected(self)
        }
    }
}

/// Verification-code store over Redis
#[derive(Clone)]
pub struct VerificationStore {
    cache: RedisPool,
}

impl VerificationStore {
    /// Create a new verification store
    pub fn new(cache: RedisPool) -> Self {
        Self { cache }
    }

    fn key(email: &str) -> String {
        format!("verify:{email}")
    }

    /// Cache a fresh pin for `email`, replacing any pending one
    pub async fn issue(&self, email: &str, pin_code: &str) -> HubResult<()> {
        let entry = CodeEntry::new(pin_code.to_string());
        let payload =
            serde_json::to_string(&entry).map_err(|e| HubError::Internal(e.into()))?;

        self.cache
            .set(&Self::key(email), &payload, Some(CODE_TTL_SECONDS))
            .await
            .map_err(HubError::Internal)?;

        Ok(())
    }

    /// Check a supplied pin; the entry is consumed on success and on lockout
    pub async fn check(&self, email: &str, supplied: &str) -> HubResult<()> {
        let key = Self::key(email);

        let Some(payload) = self.cache.get(&key).await.map_err(HubError::Internal)? else {
            return Err(HubError::VerificationExpired);
        };
        let entry: CodeEntry =
            serde_json::from_str(&payload).map_err(|e| HubError::Internal(e.into()))?;

        match entry.evaluate(supplied) {
            CodeCheck::Accepted => {
                self.cache.delete(&key).await.map_err(HubError::Internal)?;
                Ok(())
            }
            CodeCheck::LockedOut => {
                self.cache.delete(&key).await.map_err(HubError::Internal)?;
                Err(HubError::VerificationLocked)
            }
            CodeCheck::Rejected(updated) => {
                let payload =
                    serde_json::to_string(&updated).map_err(|e| HubError::Internal(e.into()))?;
                // Re-caching the counter refreshes the five-minute window.
                self.cache
                    .set(&key, &payload, Some(CODE_TTL_SECONDS))
                    .await
                    .map_err(HubError::Internal)?;
                Err(HubError::VerificationMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_pin_is_accepted() {
        let entry = CodeEntry::new("482913".to_string());
        assert_eq!(entry.evaluate("482913"), CodeCheck::Accepted);
    }

    #[test]
    fn test_wrong_pin_bumps_the_counter() {
        let entry = CodeEntry::new("482913".to_string());
        match entry.evaluate("000000") {
            CodeCheck::Rejected(updated) => assert_eq!(updated.attempts, 1),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_final_attempt_locks_out() {
        let mut entry = CodeEntry::new("482913".to_string());
        for expected_attempts in 1..MAX_ATTEMPTS {
            match entry.evaluate("000000") {
                CodeCheck::Rejected(updated) => {
                    assert_eq!(updated.attempts, expected_attempts);
                    entry = updated;
                }
                other => panic!("expected Rejected, got {other:?}"),
            }
        }
        assert_eq!(entry.evaluate("000000"), CodeCheck::LockedOut);
    }

    #[test]
    fn test_match_on_last_attempt_still_accepted() {
        let entry = CodeEntry {
            pin_code: "482913".to_string(),
            attempts: MAX_ATTEMPTS - 1,
        };
        assert_eq!(entry.evaluate("482913"), CodeCheck::Accepted);
    }
}
