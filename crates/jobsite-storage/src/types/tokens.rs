//! Access token types.
//!
//! A token grants an unauthenticated contractor scoped access to exactly one
//! work order. Only the SHA-256 hash of the link secret is ever stored; the
//! secret itself exists only in the emailed URL.

use chrono::{DateTime, Utc};

use super::{AccessTokenId, WorkOrderId};

/// Access token record.
#[derive(Clone, Debug)]
pub struct AccessToken {
    pub id: AccessTokenId,
    /// Hex-encoded SHA-256 of the link secret (lookup key, never the secret).
    pub token_hash: String,
    /// The one work order this token is scoped to.
    pub work_order_id: WorkOrderId,
    /// The only identity associated with the token; not a user account.
    pub contractor_email: String,
    pub issued_at: DateTime<Utc>,
    /// Hard TTL ceiling, independent of work-order status.
    pub base_expires_at: DateTime<Utc>,
    /// Once set, the token is permanently invalid regardless of other fields.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Updated on every successful consume, never on peek. Telemetry only.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// A token is active while it has not been revoked. Expiry is evaluated
    /// against a caller-supplied clock, not stored state.
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// Parameters for creating an access token.
#[derive(Clone, Debug)]
pub struct CreateTokenParams {
    pub token_hash: String,
    pub work_order_id: WorkOrderId,
    pub contractor_email: String,
    pub issued_at: DateTime<Utc>,
    pub base_expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_token() -> AccessToken {
        AccessToken {
            id: AccessTokenId::generate(),
            token_hash: "ab".repeat(32),
            work_order_id: WorkOrderId::generate(),
            contractor_email: "crew@example.com".to_string(),
            issued_at: Utc::now(),
            base_expires_at: Utc::now() + chrono::Duration::days(14),
            revoked_at: None,
            last_used_at: None,
        }
    }

    #[test]
    fn test_fresh_token_is_active() {
        assert!(sample_token().is_active());
    }

    #[test]
    fn test_revoked_token_is_not_active() {
        let mut token = sample_token();
        token.revoked_at = Some(Utc::now());
        assert!(!token.is_active());
    }
}
