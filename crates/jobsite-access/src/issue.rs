//! Link-secret minting and token issuance.
//!
//! The emailed link carries an opaque 32-byte secret; the store only ever
//! sees `hex(sha256(secret))`. Resolution therefore requires a server-side
//! lookup on every use, which is what keeps revocation and status-aware
//! invalidation authoritative.

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use jobsite_audit::{Actor, AuditAction, AuditEvent, AuditLog};
use jobsite_storage::{
    AccessToken, AccessTokenId, CreateTokenParams, OperatorId, StoreError, TokenStore,
    WorkOrderId,
};

use crate::error::AccessError;
use crate::recording::record;

/// Issued-link policy.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TokenPolicy {
    /// Hard TTL ceiling for issued links, in days.
    pub ttl_days: i64,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self { ttl_days: 14 }
    }
}

impl TokenPolicy {
    pub fn ttl(&self) -> Duration {
        Duration::days(self.ttl_days)
    }
}

/// Mint a fresh link secret: 32 random bytes, hex-encoded for use as a URL
/// path segment.
pub fn mint_secret() -> String {
    let mut secret = [0u8; 32];
    OsRng.fill_bytes(&mut secret);
    hex::encode(secret)
}

/// Stored lookup key for a secret: `hex(sha256(secret bytes))`.
///
/// A malformed (non-hex) presented secret is hashed over its raw text, which
/// can never match a stored key, so bad input degrades to a plain miss.
pub fn hash_secret(secret: &str) -> String {
    let bytes = hex::decode(secret).unwrap_or_else(|_| secret.as_bytes().to_vec());
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// The one moment the secret exists outside the emailed URL.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub secret: String,
    pub token: AccessToken,
}

/// Issues and revokes contractor links, keeping the one-active-token
/// invariant per `(work_order, contractor)` pair.
pub struct TokenIssuer {
    tokens: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditLog>,
    policy: TokenPolicy,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn TokenStore>, audit: Arc<dyn AuditLog>, policy: TokenPolicy) -> Self {
        Self {
            tokens,
            audit,
            policy,
        }
    }

    /// Issue a fresh link for a contractor. Any prior active token for the
    /// same pair is revoked first (revocation, not deletion, so the audit
    /// trail keeps the superseded rows).
    pub async fn issue(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        contractor_email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AccessError> {
        let contractor_email = contractor_email.trim();
        if contractor_email.is_empty() || !contractor_email.contains('@') {
            return Err(AccessError::Validation(
                "a contractor email is required".to_string(),
            ));
        }

        let superseded = self
            .tokens
            .revoke_active_tokens(work_order_id, contractor_email, now)
            .await
            .map_err(AccessError::from_store)?;
        if superseded > 0 {
            record(
                self.audit.as_ref(),
                AuditEvent::builder(
                    Actor::operator(operator_id),
                    AuditAction::TokenRevoke,
                    work_order_id,
                )
                .reason("superseded by a new link")
                .details(serde_json::json!({ "superseded": superseded }))
                .build(),
            )
            .await;
        }

        let secret = mint_secret();
        let token = self
            .tokens
            .create_token(&CreateTokenParams {
                token_hash: hash_secret(&secret),
                work_order_id: *work_order_id,
                contractor_email: contractor_email.to_string(),
                issued_at: now,
                base_expires_at: now + self.policy.ttl(),
            })
            .await
            .map_err(AccessError::from_store)?;

        record(
            self.audit.as_ref(),
            AuditEvent::builder(
                Actor::operator(operator_id),
                AuditAction::TokenIssue,
                work_order_id,
            )
            .details(serde_json::json!({
                "token_id": token.id.to_string(),
                "expires_at": token.base_expires_at.to_rfc3339(),
            }))
            .build(),
        )
        .await;

        Ok(IssuedToken { secret, token })
    }

    /// Revoke a single link.
    pub async fn revoke(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        token_id: &AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        self.tokens
            .revoke_token(token_id, now)
            .await
            .map_err(|err| match err {
                StoreError::NotFound => AccessError::TokenNotFound,
                other => AccessError::Store(other),
            })?;

        record(
            self.audit.as_ref(),
            AuditEvent::builder(
                Actor::operator(operator_id),
                AuditAction::TokenRevoke,
                work_order_id,
            )
            .details(serde_json::json!({ "token_id": token_id.to_string() }))
            .build(),
        )
        .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsite_audit::AuditLogFilter;
    use jobsite_store_memory::{MemoryAuditLog, MemoryStore};

    fn issuer(
        store: &Arc<MemoryStore>,
        audit: &Arc<MemoryAuditLog>,
    ) -> TokenIssuer {
        TokenIssuer::new(
            Arc::clone(store) as Arc<dyn TokenStore>,
            Arc::clone(audit) as Arc<dyn AuditLog>,
            TokenPolicy::default(),
        )
    }

    #[test]
    fn test_mint_secret_shape() {
        let secret = mint_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(mint_secret(), mint_secret());
    }

    #[test]
    fn test_hash_secret_is_deterministic_and_one_way() {
        let secret = mint_secret();
        assert_eq!(hash_secret(&secret), hash_secret(&secret));
        assert_ne!(hash_secret(&secret), secret);
        assert_eq!(hash_secret(&secret).len(), 64);
    }

    #[test]
    fn test_hash_secret_tolerates_garbage() {
        // Non-hex input hashes to something that can never match a stored key.
        let garbage = hash_secret("not-a-real-token");
        assert_eq!(garbage.len(), 64);
    }

    #[test]
    fn test_default_policy_ttl() {
        assert_eq!(TokenPolicy::default().ttl(), Duration::days(14));
    }

    #[tokio::test]
    async fn test_issue_creates_resolvable_token() {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let issuer = issuer(&store, &audit);
        let work_order_id = WorkOrderId::generate();
        let now = Utc::now();

        let issued = issuer
            .issue(&OperatorId::generate(), &work_order_id, "crew@example.com", now)
            .await
            .unwrap();

        assert_eq!(issued.token.work_order_id, work_order_id);
        assert_eq!(issued.token.base_expires_at, now + Duration::days(14));

        let found = store
            .get_token_by_hash(&hash_secret(&issued.secret))
            .await
            .unwrap();
        assert_eq!(found.id, issued.token.id);
    }

    #[tokio::test]
    async fn test_reissue_revokes_prior_link() {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let issuer = issuer(&store, &audit);
        let operator = OperatorId::generate();
        let work_order_id = WorkOrderId::generate();
        let now = Utc::now();

        let first = issuer
            .issue(&operator, &work_order_id, "crew@example.com", now)
            .await
            .unwrap();
        let second = issuer
            .issue(&operator, &work_order_id, "crew@example.com", now)
            .await
            .unwrap();

        let old = store
            .get_token_by_hash(&hash_secret(&first.secret))
            .await
            .unwrap();
        assert!(!old.is_active());
        assert!(second.token.is_active());

        let revokes = audit
            .query(AuditLogFilter::new().action(AuditAction::TokenRevoke))
            .await
            .unwrap();
        assert_eq!(revokes.len(), 1);
        let issues = audit
            .count(AuditLogFilter::new().action(AuditAction::TokenIssue))
            .await
            .unwrap();
        assert_eq!(issues, 2);
    }

    #[tokio::test]
    async fn test_issue_rejects_missing_email() {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let issuer = issuer(&store, &audit);

        let err = issuer
            .issue(
                &OperatorId::generate(),
                &WorkOrderId::generate(),
                "   ",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Validation(_)));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token() {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let issuer = issuer(&store, &audit);

        let err = issuer
            .revoke(
                &OperatorId::generate(),
                &WorkOrderId::generate(),
                &AccessTokenId::generate(),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::TokenNotFound));
    }
}
