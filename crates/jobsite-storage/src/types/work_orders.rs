//! Work order types.
//!
//! Only the fields the access/negotiation subsystem touches live here. The
//! single pending counter-offer is modeled as fields on the row rather than a
//! child table, which makes "at most one pending proposal" true by
//! construction.

use chrono::{DateTime, NaiveDate, Utc};

use super::{OperatorId, WorkOrderId};

/// Work order lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WorkOrderStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Rejected,
    InProgress,
    Blocked,
    Done,
    Inspected,
    Closed,
}

impl WorkOrderStatus {
    /// Terminal: no further transitions exist.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkOrderStatus::Closed)
    }

    /// Whether contractor links stop resolving in this status. Rejected is
    /// not terminal for the operator (it can still be closed), but it ends
    /// external access.
    pub fn closes_external_access(&self) -> bool {
        matches!(self, WorkOrderStatus::Closed | WorkOrderStatus::Rejected)
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkOrderStatus::Draft => "draft",
            WorkOrderStatus::Sent => "sent",
            WorkOrderStatus::Viewed => "viewed",
            WorkOrderStatus::Accepted => "accepted",
            WorkOrderStatus::Rejected => "rejected",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Blocked => "blocked",
            WorkOrderStatus::Done => "done",
            WorkOrderStatus::Inspected => "inspected",
            WorkOrderStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(WorkOrderStatus::Draft),
            "sent" => Ok(WorkOrderStatus::Sent),
            "viewed" => Ok(WorkOrderStatus::Viewed),
            "accepted" => Ok(WorkOrderStatus::Accepted),
            "rejected" => Ok(WorkOrderStatus::Rejected),
            "in_progress" => Ok(WorkOrderStatus::InProgress),
            "blocked" => Ok(WorkOrderStatus::Blocked),
            "done" => Ok(WorkOrderStatus::Done),
            "inspected" => Ok(WorkOrderStatus::Inspected),
            "closed" => Ok(WorkOrderStatus::Closed),
            _ => Err(format!("Unknown work order status: {}", s)),
        }
    }
}

/// Status of the contractor's counter-offer, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CounterOfferStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for CounterOfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CounterOfferStatus::None => "none",
            CounterOfferStatus::Pending => "pending",
            CounterOfferStatus::Approved => "approved",
            CounterOfferStatus::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for CounterOfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CounterOfferStatus::None),
            "pending" => Ok(CounterOfferStatus::Pending),
            "approved" => Ok(CounterOfferStatus::Approved),
            "rejected" => Ok(CounterOfferStatus::Rejected),
            _ => Err(format!("Unknown counter offer status: {}", s)),
        }
    }
}

/// Work order record (subsystem-relevant fields).
///
/// Costs are integer cents. `version` backs the optimistic concurrency
/// scheme: every write is a compare-and-swap keyed on `(id, version)`.
#[derive(Clone, Debug)]
pub struct WorkOrder {
    pub id: WorkOrderId,
    pub operator_id: OperatorId,
    pub title: String,
    pub status: WorkOrderStatus,

    // Operator-authored baseline terms, immutable once status passes `sent`
    // except through counter-offer approval.
    pub estimated_cost_cents: i64,
    pub requested_start_date: Option<NaiveDate>,
    pub requested_end_date: Option<NaiveDate>,

    // Current negotiation proposal; meaningful while counter_offer_status is
    // Pending, kept afterwards as the historical record of the last decision.
    pub counter_offer_status: CounterOfferStatus,
    pub proposed_cost_cents: Option<i64>,
    pub proposed_start_date: Option<NaiveDate>,
    pub proposed_end_date: Option<NaiveDate>,
    pub contractor_notes: Option<String>,

    /// Set only on the transition into `rejected`.
    pub rejection_reason: Option<String>,
    /// Informational; surfaced to the contractor, never enforced by access
    /// validation.
    pub acceptance_deadline: Option<DateTime<Utc>>,

    pub version: i64,

    // Transition timestamps, each set exactly once by the transition that
    // reaches that state.
    pub sent_at: Option<DateTime<Utc>>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a draft work order.
#[derive(Clone, Debug)]
pub struct CreateWorkOrderParams {
    pub operator_id: OperatorId,
    pub title: String,
    pub estimated_cost_cents: i64,
    pub requested_start_date: Option<NaiveDate>,
    pub requested_end_date: Option<NaiveDate>,
    pub acceptance_deadline: Option<DateTime<Utc>>,
}

impl WorkOrder {
    /// Build a fresh draft at version 1 with empty negotiation state.
    pub fn new_draft(params: CreateWorkOrderParams, now: DateTime<Utc>) -> Self {
        WorkOrder {
            id: WorkOrderId::generate(),
            operator_id: params.operator_id,
            title: params.title,
            status: WorkOrderStatus::Draft,
            estimated_cost_cents: params.estimated_cost_cents,
            requested_start_date: params.requested_start_date,
            requested_end_date: params.requested_end_date,
            counter_offer_status: CounterOfferStatus::None,
            proposed_cost_cents: None,
            proposed_start_date: None,
            proposed_end_date: None,
            contractor_notes: None,
            rejection_reason: None,
            acceptance_deadline: params.acceptance_deadline,
            version: 1,
            sent_at: None,
            viewed_at: None,
            accepted_at: None,
            rejected_at: None,
            started_at: None,
            completed_at: None,
            inspected_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a counter-offer is awaiting an operator decision.
    pub fn has_pending_counter(&self) -> bool {
        self.counter_offer_status == CounterOfferStatus::Pending
    }
}
