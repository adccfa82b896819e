//! Legal work-order transitions.
//!
//! Pure functions: a transition computes the next snapshot from the current
//! one without performing I/O. Persistence is the caller's responsibility via
//! the store's compare-and-swap, so a computed snapshot that loses the write
//! race is simply discarded.

use chrono::{DateTime, Utc};

use jobsite_storage::{CounterOfferStatus, WorkOrder, WorkOrderStatus};

use crate::error::AccessError;

/// Events that move a work order through its lifecycle.
///
/// Counter-offer submission is deliberately absent: it changes negotiation
/// fields but not `status`, and lives in the negotiation engine.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkOrderEvent {
    /// Operator sends the order to a contractor.
    Send,
    /// Contractor's first view through a consumed token.
    FirstView,
    /// Contractor accepts the offered terms.
    Accept,
    /// Contractor declines the order outright.
    Reject { reason: String },
    /// Contractor starts work.
    Start,
    /// Work is blocked on an issue.
    Block,
    /// The blocking issue is resolved.
    Resume,
    /// Contractor marks the work finished.
    MarkDone,
    /// Operator inspects the finished work.
    Inspect,
    /// Operator closes the order.
    Close,
}

impl WorkOrderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkOrderEvent::Send => "send",
            WorkOrderEvent::FirstView => "first_view",
            WorkOrderEvent::Accept => "accept",
            WorkOrderEvent::Reject { .. } => "reject",
            WorkOrderEvent::Start => "start",
            WorkOrderEvent::Block => "block",
            WorkOrderEvent::Resume => "resume",
            WorkOrderEvent::MarkDone => "mark_done",
            WorkOrderEvent::Inspect => "inspect",
            WorkOrderEvent::Close => "close",
        }
    }
}

impl std::fmt::Display for WorkOrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Apply an event to a snapshot, returning the next snapshot.
///
/// Never mutates the input. Each transition timestamp is set exactly once,
/// by the transition that reaches the state. Illegal `(status, event)` pairs
/// fail with [`AccessError::IllegalTransition`] carrying both for
/// diagnostics.
pub fn apply(
    current: &WorkOrder,
    event: &WorkOrderEvent,
    now: DateTime<Utc>,
) -> Result<WorkOrder, AccessError> {
    use WorkOrderStatus::*;

    let mut next = current.clone();
    match (current.status, event) {
        (Draft, WorkOrderEvent::Send) => {
            next.status = Sent;
            next.sent_at = Some(now);
        }
        (Sent, WorkOrderEvent::FirstView) => {
            next.status = Viewed;
            next.viewed_at = Some(now);
        }
        (Viewed, WorkOrderEvent::Accept) => {
            // Accepting as-offered is only legal while no proposal awaits a
            // decision; deviating terms go through the negotiation engine.
            if current.counter_offer_status == CounterOfferStatus::Pending {
                return Err(AccessError::AlreadyPending);
            }
            next.status = Accepted;
            next.accepted_at = Some(now);
        }
        (Viewed, WorkOrderEvent::Reject { reason }) => {
            if reason.trim().is_empty() {
                return Err(AccessError::Validation(
                    "a rejection reason is required".to_string(),
                ));
            }
            next.status = Rejected;
            next.rejected_at = Some(now);
            next.rejection_reason = Some(reason.clone());
        }
        (Accepted, WorkOrderEvent::Start) => {
            next.status = InProgress;
            next.started_at = Some(now);
        }
        (InProgress, WorkOrderEvent::Block) => {
            next.status = Blocked;
        }
        (Blocked, WorkOrderEvent::Resume) => {
            next.status = InProgress;
        }
        (InProgress, WorkOrderEvent::MarkDone) => {
            next.status = Done;
            next.completed_at = Some(now);
        }
        (Done, WorkOrderEvent::Inspect) => {
            next.status = Inspected;
            next.inspected_at = Some(now);
        }
        (Inspected | Done | Rejected, WorkOrderEvent::Close) => {
            next.status = Closed;
            next.closed_at = Some(now);
        }
        _ => {
            return Err(AccessError::IllegalTransition {
                status: current.status,
                event: event.name(),
            });
        }
    }
    next.updated_at = now;
    Ok(next)
}
