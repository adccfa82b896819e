//! Actor-facing entry points composing the gateway, state machine, and
//! negotiation engine over the store traits.
//!
//! [`ContractorPortal`] is the conceptual `peek`/`respond` endpoint behind
//! the emailed link; [`OperatorDesk`] is the back-office side. A mutating
//! call returns the updated snapshot directly, so the caller re-renders from
//! the result instead of reloading.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use jobsite_audit::{Actor, AuditAction, AuditEvent, AuditLog};
use jobsite_storage::{
    CreateWorkOrderParams, OperatorId, StoreError, TokenStore, WorkOrder, WorkOrderId,
    WorkOrderStore,
};

use crate::error::AccessError;
use crate::gateway::TokenGateway;
use crate::issue::{IssuedToken, TokenIssuer, TokenPolicy};
use crate::negotiation::{CounterDecision, CounterProposal, NegotiationEngine};
use crate::recording::record;
use crate::state_machine::{self, WorkOrderEvent};

/// A contractor response to an offered work order.
#[derive(Clone, Debug)]
pub enum RespondAction {
    /// Accept as offered; the optional cost is an echo the caller may send
    /// to prove it accepted the terms it was shown.
    Accept { confirmed_cost_cents: Option<i64> },
    Reject { reason: String },
    CounterOffer(CounterProposal),
}

/// What the contractor sees on a successful peek.
#[derive(Clone, Debug)]
pub struct PeekView {
    pub work_order: WorkOrder,
    pub contractor_email: String,
}

/// The contractor-facing surface behind a magic link.
pub struct ContractorPortal {
    gateway: TokenGateway,
    engine: NegotiationEngine,
    work_orders: Arc<dyn WorkOrderStore>,
    audit: Arc<dyn AuditLog>,
}

impl ContractorPortal {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        work_orders: Arc<dyn WorkOrderStore>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            gateway: TokenGateway::new(
                Arc::clone(&tokens),
                Arc::clone(&work_orders),
                Arc::clone(&audit),
            ),
            engine: NegotiationEngine::new(Arc::clone(&work_orders), Arc::clone(&audit)),
            work_orders,
            audit,
        }
    }

    /// Read-only view for rendering. Errors map to one of
    /// `not_found | expired | revoked | work_order_closed` via
    /// [`AccessError::kind`].
    pub async fn peek(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<PeekView, AccessError> {
        let grant = self.gateway.peek(secret, work_order_id, now).await?;
        Ok(PeekView {
            contractor_email: grant.token.contractor_email.clone(),
            work_order: grant.work_order,
        })
    }

    /// Act on the work order through the link. Consume-validates the token,
    /// dispatches the action, and retries exactly once on a version conflict
    /// with a re-read snapshot before surfacing it.
    pub async fn respond(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        action: RespondAction,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let grant = self.gateway.consume(secret, work_order_id, now).await?;
        let actor = Actor::contractor(&grant.token.id);

        match self.dispatch(actor, &grant.work_order, &action, now).await {
            Err(AccessError::VersionConflict) => {
                debug!(work_order_id = %work_order_id, "respond hit a version conflict, retrying once");
                let fresh = self.reload(work_order_id).await?;
                self.dispatch(actor, &fresh, &action, now).await
            }
            result => result,
        }
    }

    /// Contractor starts the accepted work through their link.
    pub async fn start(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.transition_via_link(
            secret,
            work_order_id,
            WorkOrderEvent::Start,
            AuditAction::WorkOrderStart,
            now,
        )
        .await
    }

    /// Contractor marks the work finished through their link.
    pub async fn mark_done(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.transition_via_link(
            secret,
            work_order_id,
            WorkOrderEvent::MarkDone,
            AuditAction::WorkOrderComplete,
            now,
        )
        .await
    }

    async fn dispatch(
        &self,
        actor: Actor,
        snapshot: &WorkOrder,
        action: &RespondAction,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        match action {
            RespondAction::Accept {
                confirmed_cost_cents,
            } => {
                self.engine
                    .direct_accept(
                        actor,
                        &snapshot.id,
                        snapshot.version,
                        *confirmed_cost_cents,
                        now,
                    )
                    .await
            }
            RespondAction::Reject { reason } => {
                self.engine
                    .reject(actor, &snapshot.id, snapshot.version, reason.clone(), now)
                    .await
            }
            RespondAction::CounterOffer(proposal) => {
                self.engine
                    .propose_counter(actor, &snapshot.id, snapshot.version, proposal.clone(), now)
                    .await
            }
        }
    }

    async fn transition_via_link(
        &self,
        secret: &str,
        work_order_id: &WorkOrderId,
        event: WorkOrderEvent,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let grant = self.gateway.consume(secret, work_order_id, now).await?;
        let actor = Actor::contractor(&grant.token.id);

        match self
            .apply_and_write(actor, &grant.work_order, &event, action, now)
            .await
        {
            Err(AccessError::VersionConflict) => {
                let fresh = self.reload(work_order_id).await?;
                self.apply_and_write(actor, &fresh, &event, action, now).await
            }
            result => result,
        }
    }

    async fn apply_and_write(
        &self,
        actor: Actor,
        current: &WorkOrder,
        event: &WorkOrderEvent,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let next = state_machine::apply(current, event, now)?;
        let updated = self
            .work_orders
            .update_work_order(current.version, &next)
            .await
            .map_err(AccessError::from_store)?;
        record(
            self.audit.as_ref(),
            AuditEvent::builder(actor, action, &updated.id)
                .transition(current.status, updated.status)
                .build(),
        )
        .await;
        Ok(updated)
    }

    async fn reload(&self, work_order_id: &WorkOrderId) -> Result<WorkOrder, AccessError> {
        match self.work_orders.get_work_order(work_order_id).await {
            Ok(work_order) => Ok(work_order),
            Err(StoreError::NotFound) => Err(AccessError::WorkOrderNotFound),
            Err(other) => Err(AccessError::Store(other)),
        }
    }
}

/// The operator-facing surface: drafting, sending, deciding, inspecting,
/// closing, and link management.
pub struct OperatorDesk {
    tokens: Arc<dyn TokenStore>,
    work_orders: Arc<dyn WorkOrderStore>,
    audit: Arc<dyn AuditLog>,
    issuer: TokenIssuer,
    engine: NegotiationEngine,
}

impl OperatorDesk {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        work_orders: Arc<dyn WorkOrderStore>,
        audit: Arc<dyn AuditLog>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            issuer: TokenIssuer::new(Arc::clone(&tokens), Arc::clone(&audit), policy),
            engine: NegotiationEngine::new(Arc::clone(&work_orders), Arc::clone(&audit)),
            tokens,
            work_orders,
            audit,
        }
    }

    /// Create a draft. Drafts are internal; nothing is emailed yet.
    pub async fn create_draft(
        &self,
        params: CreateWorkOrderParams,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        if params.title.trim().is_empty() {
            return Err(AccessError::Validation("a title is required".to_string()));
        }
        if params.estimated_cost_cents < 0 {
            return Err(AccessError::Validation(
                "the estimated cost cannot be negative".to_string(),
            ));
        }
        let work_order = WorkOrder::new_draft(params, now);
        self.work_orders
            .create_work_order(&work_order)
            .await
            .map_err(|err| match err {
                StoreError::AlreadyExists => {
                    AccessError::Validation("work order already exists".to_string())
                }
                other => AccessError::Store(other),
            })?;
        Ok(work_order)
    }

    /// Send the order to a contractor: `draft → sent` plus a fresh link for
    /// the recipient. The secret in the result is shown once and never
    /// stored.
    pub async fn send(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        contractor_email: &str,
        now: DateTime<Utc>,
    ) -> Result<(WorkOrder, IssuedToken), AccessError> {
        let updated = self
            .transition(
                operator_id,
                work_order_id,
                expected_version,
                WorkOrderEvent::Send,
                AuditAction::WorkOrderSend,
                now,
            )
            .await?;
        let issued = self
            .issuer
            .issue(operator_id, work_order_id, contractor_email, now)
            .await?;
        Ok((updated, issued))
    }

    /// Issue a replacement link (e.g., the contractor lost the email or the
    /// old link expired). Prior active links for the recipient are revoked.
    pub async fn reissue_link(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        contractor_email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.status.closes_external_access() {
            return Err(AccessError::WorkOrderClosed);
        }
        self.issuer
            .issue(operator_id, work_order_id, contractor_email, now)
            .await
    }

    /// Decide a pending counter-offer.
    pub async fn decide_counter(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        decision: CounterDecision,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.engine
            .decide_counter(
                Actor::operator(operator_id),
                work_order_id,
                expected_version,
                decision,
                note,
                now,
            )
            .await
    }

    /// Flag the in-progress work as blocked.
    pub async fn block(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.transition(
            operator_id,
            work_order_id,
            expected_version,
            WorkOrderEvent::Block,
            AuditAction::WorkOrderBlock,
            now,
        )
        .await
    }

    /// Resume blocked work.
    pub async fn resume(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.transition(
            operator_id,
            work_order_id,
            expected_version,
            WorkOrderEvent::Resume,
            AuditAction::WorkOrderResume,
            now,
        )
        .await
    }

    /// Record the inspection of finished work.
    pub async fn inspect(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        self.transition(
            operator_id,
            work_order_id,
            expected_version,
            WorkOrderEvent::Inspect,
            AuditAction::WorkOrderInspect,
            now,
        )
        .await
    }

    /// Close the order. Outstanding links are revoked immediately; a closed
    /// order must not resolve for anyone, regardless of token TTLs.
    pub async fn close(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let updated = self
            .transition(
                operator_id,
                work_order_id,
                expected_version,
                WorkOrderEvent::Close,
                AuditAction::WorkOrderClose,
                now,
            )
            .await?;

        let tokens = self
            .tokens
            .list_tokens_for_work_order(work_order_id)
            .await
            .map_err(AccessError::from_store)?;
        let mut revoked = 0;
        for token in tokens.iter().filter(|t| t.is_active()) {
            self.tokens
                .revoke_token(&token.id, now)
                .await
                .map_err(AccessError::from_store)?;
            revoked += 1;
        }
        if revoked > 0 {
            record(
                self.audit.as_ref(),
                AuditEvent::builder(
                    Actor::operator(operator_id),
                    AuditAction::TokenRevoke,
                    work_order_id,
                )
                .reason("work order closed")
                .details(serde_json::json!({ "revoked": revoked }))
                .build(),
            )
            .await;
        }
        Ok(updated)
    }

    /// Revoke a single outstanding link.
    pub async fn revoke_link(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        token_id: &jobsite_storage::AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), AccessError> {
        self.issuer
            .revoke(operator_id, work_order_id, token_id, now)
            .await
    }

    async fn transition(
        &self,
        operator_id: &OperatorId,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        event: WorkOrderEvent,
        action: AuditAction,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.version != expected_version {
            return Err(AccessError::VersionConflict);
        }
        let next = state_machine::apply(&current, &event, now)?;
        let updated = self
            .work_orders
            .update_work_order(expected_version, &next)
            .await
            .map_err(AccessError::from_store)?;
        record(
            self.audit.as_ref(),
            AuditEvent::builder(Actor::operator(operator_id), action, work_order_id)
                .transition(current.status, updated.status)
                .build(),
        )
        .await;
        Ok(updated)
    }

    async fn load(&self, work_order_id: &WorkOrderId) -> Result<WorkOrder, AccessError> {
        match self.work_orders.get_work_order(work_order_id).await {
            Ok(work_order) => Ok(work_order),
            Err(StoreError::NotFound) => Err(AccessError::WorkOrderNotFound),
            Err(other) => Err(AccessError::Store(other)),
        }
    }
}
