//! Token gateway: resolves a presented link into an access decision.
//!
//! Usability of a token depends on three independent facts: its own
//! revocation, its TTL ceiling, and the referenced work order's lifecycle
//! status. The last one matters because an order that closes early must
//! invalidate outstanding links immediately, with a reason distinct from
//! expiry ("contact the operator" rather than "request a new link").

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use jobsite_audit::{Actor, AuditAction, AuditEvent, AuditLog};
use jobsite_storage::{
    AccessToken, StoreError, TokenStore, WorkOrder, WorkOrderId, WorkOrderStatus, WorkOrderStore,
};

use crate::error::AccessError;
use crate::issue::hash_secret;
use crate::recording::record;
use crate::state_machine::{self, WorkOrderEvent};

/// A validated token/work-order pair.
#[derive(Clone, Debug)]
pub struct AccessGrant {
    pub token: AccessToken,
    pub work_order: WorkOrder,
}

pub struct TokenGateway {
    tokens: Arc<dyn TokenStore>,
    work_orders: Arc<dyn WorkOrderStore>,
    audit: Arc<dyn AuditLog>,
}

impl TokenGateway {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        work_orders: Arc<dyn WorkOrderStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            tokens,
            work_orders,
            audit,
        }
    }

    /// Read-only validation. Idempotent, safe on every page load: commits no
    /// side effects, not even `last_used_at`.
    pub async fn peek(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessError> {
        self.validate(secret, work_order_id, now).await
    }

    /// Same validation, then marks usage and drives the one-time
    /// `sent → viewed` transition. The only entry point permitted to trigger
    /// state-machine transitions downstream.
    pub async fn consume(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessError> {
        let mut grant = self.validate(secret, work_order_id, now).await?;

        // Telemetry only; the access decision must not fail on it.
        if let Err(err) = self.tokens.mark_token_used(&grant.token.id, now).await {
            warn!(token_id = %grant.token.id, error = %err, "failed to record token usage");
        }

        if grant.work_order.status == WorkOrderStatus::Sent {
            grant.work_order = self.first_view(&grant, now).await?;
        }
        Ok(grant)
    }

    /// The shared six-step validation, in order: token lookup, revocation,
    /// TTL, entity binding, entity load, status-aware closure.
    async fn validate(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<AccessGrant, AccessError> {
        let token = match self.tokens.get_token_by_hash(&hash_secret(secret)).await {
            Ok(token) => token,
            Err(StoreError::NotFound) => return Err(AccessError::TokenNotFound),
            Err(other) => return Err(AccessError::Store(other)),
        };

        if token.revoked_at.is_some() {
            return Err(AccessError::TokenRevoked);
        }
        if now > token.base_expires_at {
            return Err(AccessError::TokenExpired);
        }
        // Token confusion guard: the presented order id must be the one the
        // token is bound to.
        if token.work_order_id != *work_order_id {
            return Err(AccessError::WorkOrderNotFound);
        }

        let work_order = match self.work_orders.get_work_order(work_order_id).await {
            Ok(work_order) => work_order,
            Err(StoreError::NotFound) => return Err(AccessError::WorkOrderNotFound),
            Err(other) => return Err(AccessError::Store(other)),
        };

        // Checked after TTL on purpose: a closed order wins over an expired
        // token so the caller gets the non-recoverable reason.
        if work_order.status.closes_external_access() {
            return Err(AccessError::WorkOrderClosed);
        }

        Ok(AccessGrant { token, work_order })
    }

    /// First view: `sent → viewed` under compare-and-swap. Under N
    /// concurrent first views exactly one write succeeds; losers observe
    /// the already-viewed order and treat it as success.
    async fn first_view(
        &self,
        grant: &AccessGrant,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let viewed = state_machine::apply(&grant.work_order, &WorkOrderEvent::FirstView, now)?;
        match self
            .work_orders
            .update_work_order(grant.work_order.version, &viewed)
            .await
        {
            Ok(updated) => {
                record(
                    self.audit.as_ref(),
                    AuditEvent::builder(
                        Actor::contractor(&grant.token.id),
                        AuditAction::WorkOrderView,
                        &updated.id,
                    )
                    .transition(WorkOrderStatus::Sent, WorkOrderStatus::Viewed)
                    .build(),
                )
                .await;
                Ok(updated)
            }
            Err(StoreError::Conflict) => {
                debug!(work_order_id = %grant.work_order.id, "lost first-view race, re-reading");
                let fresh = match self.work_orders.get_work_order(&grant.work_order.id).await {
                    Ok(fresh) => fresh,
                    Err(StoreError::NotFound) => return Err(AccessError::WorkOrderNotFound),
                    Err(other) => return Err(AccessError::Store(other)),
                };
                // A concurrent writer may also have closed the order; the
                // status-aware rule still applies to the fresh snapshot.
                if fresh.status.closes_external_access() {
                    return Err(AccessError::WorkOrderClosed);
                }
                Ok(fresh)
            }
            Err(other) => Err(AccessError::Store(other)),
        }
    }
}
