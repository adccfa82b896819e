//! The store traits that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// Persistence for access tokens. Pure data access, no policy: expiry and
/// status rules live in the access layer.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Create a token row. Backends must reject a second active (non-revoked)
    /// token for the same `(work_order_id, contractor_email)` pair with
    /// `AlreadyExists`; callers revoke prior tokens first.
    async fn create_token(&self, params: &CreateTokenParams)
        -> Result<AccessToken, StoreError>;

    /// Look up a token by its stored hash.
    async fn get_token_by_hash(&self, token_hash: &str) -> Result<AccessToken, StoreError>;

    /// All tokens ever issued for a work order, revoked ones included.
    async fn list_tokens_for_work_order(
        &self,
        work_order_id: &WorkOrderId,
    ) -> Result<Vec<AccessToken>, StoreError>;

    /// Revoke a single token. Idempotent: an already-revoked token keeps its
    /// original `revoked_at`.
    async fn revoke_token(
        &self,
        token_id: &AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Revoke every active token for a `(work_order, contractor)` pair.
    /// Returns how many were revoked. Revocation, not deletion: rows stay
    /// for audit history.
    async fn revoke_active_tokens(
        &self,
        work_order_id: &WorkOrderId,
        contractor_email: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError>;

    /// Record a successful consume on the token. Best-effort telemetry; the
    /// access decision must not fail on this call's error.
    async fn mark_token_used(
        &self,
        token_id: &AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Persistence for the work order's mutable lifecycle fields.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait WorkOrderStore: Send + Sync {
    async fn create_work_order(&self, work_order: &WorkOrder) -> Result<(), StoreError>;

    async fn get_work_order(&self, id: &WorkOrderId) -> Result<WorkOrder, StoreError>;

    /// Atomic compare-and-swap: persists `updated` with `version` bumped to
    /// `expected_version + 1` iff the stored version still equals
    /// `expected_version`; otherwise fails with `Conflict` and writes
    /// nothing. Returns the persisted row.
    async fn update_work_order(
        &self,
        expected_version: i64,
        updated: &WorkOrder,
    ) -> Result<WorkOrder, StoreError>;
}
