//! The counter-offer sub-protocol, layered on the `viewed` state.
//!
//! The pending proposal is a field set on the work-order row, not a child
//! collection, so "at most one pending proposal" holds by construction.
//! Every mutation is a single compare-and-swap on the caller's
//! `expected_version`; a losing writer gets `VersionConflict` and must retry
//! with a re-read snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use jobsite_audit::{Actor, AuditAction, AuditEvent, AuditLog};
use jobsite_storage::{
    CounterOfferStatus, StoreError, WorkOrder, WorkOrderId, WorkOrderStatus, WorkOrderStore,
};

use crate::error::AccessError;
use crate::recording::record;
use crate::state_machine::{self, WorkOrderEvent};

/// Contractor-proposed alternative terms. Notes alone do not make a
/// counter-offer; at least one term must be supplied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CounterProposal {
    pub proposed_cost_cents: Option<i64>,
    pub proposed_start_date: Option<NaiveDate>,
    pub proposed_end_date: Option<NaiveDate>,
    pub contractor_notes: Option<String>,
}

impl CounterProposal {
    fn has_terms(&self) -> bool {
        self.proposed_cost_cents.is_some()
            || self.proposed_start_date.is_some()
            || self.proposed_end_date.is_some()
    }

    /// Whether any supplied term deviates from the operator's baseline.
    fn differs_from(&self, work_order: &WorkOrder) -> bool {
        let cost = self
            .proposed_cost_cents
            .is_some_and(|c| c != work_order.estimated_cost_cents);
        let start = self
            .proposed_start_date
            .is_some_and(|d| Some(d) != work_order.requested_start_date);
        let end = self
            .proposed_end_date
            .is_some_and(|d| Some(d) != work_order.requested_end_date);
        cost || start || end
    }
}

/// Operator's decision on a pending counter-offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterDecision {
    Approved,
    Rejected,
}

pub struct NegotiationEngine {
    work_orders: Arc<dyn WorkOrderStore>,
    audit: Arc<dyn AuditLog>,
}

impl NegotiationEngine {
    pub fn new(work_orders: Arc<dyn WorkOrderStore>, audit: Arc<dyn AuditLog>) -> Self {
        Self { work_orders, audit }
    }

    /// Submit a counter-offer. Requires `status = viewed` and no pending
    /// proposal (a rejected one may be resubmitted over). Identical terms
    /// are refused so the caller is steered to plain accept, keeping the
    /// accept and negotiate rails from silently converging.
    pub async fn propose_counter(
        &self,
        actor: Actor,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        proposal: CounterProposal,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.version != expected_version {
            return Err(AccessError::VersionConflict);
        }
        if current.status != WorkOrderStatus::Viewed {
            return Err(AccessError::IllegalTransition {
                status: current.status,
                event: "counter_offer",
            });
        }
        if current.has_pending_counter() {
            return Err(AccessError::AlreadyPending);
        }
        if !proposal.has_terms() {
            return Err(AccessError::Validation(
                "a counter-offer needs at least one of cost, start date, or end date".to_string(),
            ));
        }
        if !proposal.differs_from(&current) {
            return Err(AccessError::Validation(
                "proposed terms match the offer; accept it instead".to_string(),
            ));
        }

        let mut next = current.clone();
        next.counter_offer_status = CounterOfferStatus::Pending;
        next.proposed_cost_cents = proposal.proposed_cost_cents;
        next.proposed_start_date = proposal.proposed_start_date;
        next.proposed_end_date = proposal.proposed_end_date;
        next.contractor_notes = proposal.contractor_notes.clone();
        next.updated_at = now;

        let updated = self.write(expected_version, &next).await?;
        info!(work_order_id = %work_order_id, "counter-offer submitted");
        record(
            self.audit.as_ref(),
            AuditEvent::builder(actor, AuditAction::CounterOfferSubmit, work_order_id)
                .details(serde_json::json!({
                    "proposed_cost_cents": proposal.proposed_cost_cents,
                    "proposed_start_date": proposal.proposed_start_date,
                    "proposed_end_date": proposal.proposed_end_date,
                }))
                .build(),
        )
        .await;
        Ok(updated)
    }

    /// Decide a pending counter-offer. Approval promotes the proposal fields
    /// into the baseline and accepts the order in the same write; there is
    /// no observable snapshot with promoted fields but unchanged status.
    /// Rejection keeps `status = viewed` so the contractor may retry or fall
    /// back to plain accept/reject.
    pub async fn decide_counter(
        &self,
        actor: Actor,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        decision: CounterDecision,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.version != expected_version {
            return Err(AccessError::VersionConflict);
        }
        if !current.has_pending_counter() {
            return Err(AccessError::NothingPending);
        }

        let mut next = current.clone();
        let action = match decision {
            CounterDecision::Approved => {
                if let Some(cost) = next.proposed_cost_cents {
                    next.estimated_cost_cents = cost;
                }
                if let Some(start) = next.proposed_start_date {
                    next.requested_start_date = Some(start);
                }
                if let Some(end) = next.proposed_end_date {
                    next.requested_end_date = Some(end);
                }
                next.counter_offer_status = CounterOfferStatus::Approved;
                next = state_machine::apply(&next, &WorkOrderEvent::Accept, now)?;
                AuditAction::CounterOfferApprove
            }
            CounterDecision::Rejected => {
                // Proposal fields stay on the row as the historical record.
                next.counter_offer_status = CounterOfferStatus::Rejected;
                next.updated_at = now;
                AuditAction::CounterOfferReject
            }
        };

        let updated = self.write(expected_version, &next).await?;
        info!(work_order_id = %work_order_id, decision = ?decision, "counter-offer decided");
        let mut event = AuditEvent::builder(actor, action, work_order_id)
            .transition(current.status, updated.status);
        if let Some(note) = note {
            event = event.reason(note);
        }
        record(self.audit.as_ref(), event.build()).await;
        Ok(updated)
    }

    /// Accept the order as offered. A cost echo that differs from the
    /// baseline fails with `UseCounterOfferInstead` rather than silently
    /// diverging: deviations must be seen and approved by the operator.
    pub async fn direct_accept(
        &self,
        actor: Actor,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        confirmed_cost_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.version != expected_version {
            return Err(AccessError::VersionConflict);
        }
        if current.has_pending_counter() {
            return Err(AccessError::AlreadyPending);
        }
        if let Some(cost) = confirmed_cost_cents {
            if cost != current.estimated_cost_cents {
                return Err(AccessError::UseCounterOfferInstead);
            }
        }

        let next = state_machine::apply(&current, &WorkOrderEvent::Accept, now)?;
        let updated = self.write(expected_version, &next).await?;
        record(
            self.audit.as_ref(),
            AuditEvent::builder(actor, AuditAction::WorkOrderAccept, work_order_id)
                .transition(current.status, updated.status)
                .build(),
        )
        .await;
        Ok(updated)
    }

    /// Decline the order outright. A reason is required.
    pub async fn reject(
        &self,
        actor: Actor,
        work_order_id: &WorkOrderId,
        expected_version: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<WorkOrder, AccessError> {
        let current = self.load(work_order_id).await?;
        if current.version != expected_version {
            return Err(AccessError::VersionConflict);
        }

        let next = state_machine::apply(
            &current,
            &WorkOrderEvent::Reject {
                reason: reason.clone(),
            },
            now,
        )?;
        let updated = self.write(expected_version, &next).await?;
        record(
            self.audit.as_ref(),
            AuditEvent::builder(actor, AuditAction::WorkOrderReject, work_order_id)
                .transition(current.status, updated.status)
                .reason(reason)
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

    async fn write(
        &self,
        expected_version: i64,
        next: &WorkOrder,
    ) -> Result<WorkOrder, AccessError> {
        self.work_orders
            .update_work_order(expected_version, next)
            .await
            .map_err(AccessError::from_store)
    }
}
