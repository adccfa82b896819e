//! Audit logging abstraction for jobsite.
//!
//! This crate defines the `AuditLog` trait for persisting audit events and
//! the types representing auditable actions in the access/negotiation
//! protocol. Every state-affecting call emits exactly one immutable event;
//! read-only peeks emit nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use jobsite_storage::{AccessTokenId, OperatorId, WorkOrderId, WorkOrderStatus};

/// Unique identifier for an audit log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditEventId(pub Uuid);

impl AuditEventId {
    /// Generate a new audit event ID using UUID v7 (time-ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AuditEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuditEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AuditEventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Who performed the action. Contractors have no account; the token they
/// presented is their only identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Operator { operator_id: Uuid },
    Contractor { token_id: Uuid },
}

impl Actor {
    pub fn operator(id: &OperatorId) -> Self {
        Actor::Operator { operator_id: id.0 }
    }

    pub fn contractor(token_id: &AccessTokenId) -> Self {
        Actor::Contractor {
            token_id: token_id.0,
        }
    }

    /// The token behind a contractor action, if any.
    pub fn token_id(&self) -> Option<AccessTokenId> {
        match self {
            Actor::Operator { .. } => None,
            Actor::Contractor { token_id } => Some(AccessTokenId(*token_id)),
        }
    }
}

/// Categories of auditable actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Work order lifecycle
    WorkOrderSend,
    WorkOrderView,
    WorkOrderAccept,
    WorkOrderReject,
    WorkOrderStart,
    WorkOrderBlock,
    WorkOrderResume,
    WorkOrderComplete,
    WorkOrderInspect,
    WorkOrderClose,

    // Token lifecycle
    TokenIssue,
    TokenRevoke,

    // Negotiation
    CounterOfferSubmit,
    CounterOfferApprove,
    CounterOfferReject,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::WorkOrderSend => "work_order.send",
            AuditAction::WorkOrderView => "work_order.view",
            AuditAction::WorkOrderAccept => "work_order.accept",
            AuditAction::WorkOrderReject => "work_order.reject",
            AuditAction::WorkOrderStart => "work_order.start",
            AuditAction::WorkOrderBlock => "work_order.block",
            AuditAction::WorkOrderResume => "work_order.resume",
            AuditAction::WorkOrderComplete => "work_order.complete",
            AuditAction::WorkOrderInspect => "work_order.inspect",
            AuditAction::WorkOrderClose => "work_order.close",
            AuditAction::TokenIssue => "token.issue",
            AuditAction::TokenRevoke => "token.revoke",
            AuditAction::CounterOfferSubmit => "counter_offer.submit",
            AuditAction::CounterOfferApprove => "counter_offer.approve",
            AuditAction::CounterOfferReject => "counter_offer.reject",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work_order.send" => Ok(AuditAction::WorkOrderSend),
            "work_order.view" => Ok(AuditAction::WorkOrderView),
            "work_order.accept" => Ok(AuditAction::WorkOrderAccept),
            "work_order.reject" => Ok(AuditAction::WorkOrderReject),
            "work_order.start" => Ok(AuditAction::WorkOrderStart),
            "work_order.block" => Ok(AuditAction::WorkOrderBlock),
            "work_order.resume" => Ok(AuditAction::WorkOrderResume),
            "work_order.complete" => Ok(AuditAction::WorkOrderComplete),
            "work_order.inspect" => Ok(AuditAction::WorkOrderInspect),
            "work_order.close" => Ok(AuditAction::WorkOrderClose),
            "token.issue" => Ok(AuditAction::TokenIssue),
            "token.revoke" => Ok(AuditAction::TokenRevoke),
            "counter_offer.submit" => Ok(AuditAction::CounterOfferSubmit),
            "counter_offer.approve" => Ok(AuditAction::CounterOfferApprove),
            "counter_offer.reject" => Ok(AuditAction::CounterOfferReject),
            _ => Err(format!("Unknown audit action: {}", s)),
        }
    }
}

/// Result of an audited operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Denied,
    NotFound,
    InvalidRequest,
    Conflict,
    Error,
}

impl std::fmt::Display for AuditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditResult::Success => "success",
            AuditResult::Denied => "denied",
            AuditResult::NotFound => "not_found",
            AuditResult::InvalidRequest => "invalid_request",
            AuditResult::Conflict => "conflict",
            AuditResult::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for AuditResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditResult::Success),
            "denied" => Ok(AuditResult::Denied),
            "not_found" => Ok(AuditResult::NotFound),
            "invalid_request" => Ok(AuditResult::InvalidRequest),
            "conflict" => Ok(AuditResult::Conflict),
            "error" => Ok(AuditResult::Error),
            _ => Err(format!("Unknown audit result: {}", s)),
        }
    }
}

/// An audit log entry representing a single auditable action.
///
/// Uses raw UUIDs for serialization compatibility. Use the builder to
/// construct events from typed IDs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier for this audit entry
    pub id: AuditEventId,
    /// When the action occurred
    pub timestamp: DateTime<Utc>,
    /// Who performed the action (operator id or token id)
    pub actor: Actor,
    /// The action that was performed
    pub action: AuditAction,
    /// The work order the action was scoped to
    pub work_order_id: Uuid,
    /// Status before the transition, if the action moved the state machine
    pub from_status: Option<String>,
    /// Status after the transition, if the action moved the state machine
    pub to_status: Option<String>,
    /// Result of the operation
    pub result: AuditResult,
    /// Error message or additional context
    pub reason: Option<String>,
    /// Additional details as JSON (e.g., superseded token counts, proposal terms)
    pub details: Option<serde_json::Value>,
}

impl AuditEvent {
    /// Create a new audit event builder
    pub fn builder(actor: Actor, action: AuditAction, work_order_id: &WorkOrderId) -> AuditEventBuilder {
        AuditEventBuilder::new(actor, action, work_order_id)
    }

    /// Get the work order ID as a typed ID
    pub fn get_work_order_id(&self) -> WorkOrderId {
        WorkOrderId(self.work_order_id)
    }
}

/// Builder for constructing audit events
pub struct AuditEventBuilder {
    actor: Actor,
    action: AuditAction,
    work_order_id: Uuid,
    from_status: Option<String>,
    to_status: Option<String>,
    result: AuditResult,
    reason: Option<String>,
    details: Option<serde_json::Value>,
}

impl AuditEventBuilder {
    pub fn new(actor: Actor, action: AuditAction, work_order_id: &WorkOrderId) -> Self {
        Self {
            actor,
            action,
            work_order_id: work_order_id.0,
            from_status: None,
            to_status: None,
            result: AuditResult::Success,
            reason: None,
            details: None,
        }
    }

    pub fn transition(mut self, from: WorkOrderStatus, to: WorkOrderStatus) -> Self {
        self.from_status = Some(from.to_string());
        self.to_status = Some(to.to_string());
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = result;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn build(self) -> AuditEvent {
        AuditEvent {
            id: AuditEventId::new(),
            timestamp: Utc::now(),
            actor: self.actor,
            action: self.action,
            work_order_id: self.work_order_id,
            from_status: self.from_status,
            to_status: self.to_status,
            result: self.result,
            reason: self.reason,
            details: self.details,
        }
    }
}

/// Filter for querying audit logs
#[derive(Clone, Debug, Default)]
pub struct AuditLogFilter {
    /// Filter by work order ID
    pub work_order_id: Option<WorkOrderId>,
    /// Filter by the token behind a contractor action
    pub token_id: Option<AccessTokenId>,
    /// Filter by action
    pub action: Option<AuditAction>,
    /// Filter by result
    pub result: Option<AuditResult>,
    /// Filter by start timestamp (inclusive)
    pub from: Option<DateTime<Utc>>,
    /// Filter by end timestamp (exclusive)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of results to return
    pub limit: Option<u32>,
    /// Number of results to skip (for pagination)
    pub offset: Option<u32>,
}

impl AuditLogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn work_order_id(mut self, work_order_id: WorkOrderId) -> Self {
        self.work_order_id = Some(work_order_id);
        self
    }

    pub fn token_id(mut self, token_id: AccessTokenId) -> Self {
        self.token_id = Some(token_id);
        self
    }

    pub fn action(mut self, action: AuditAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn result(mut self, result: AuditResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Error type for audit log operations
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("audit event not found: {0}")]
    NotFound(AuditEventId),
}

/// Trait for audit log persistence.
///
/// Implementations store audit events and provide query capabilities for
/// later inspection.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Record an audit event.
    ///
    /// Failures to record audit events should be logged but must not fail
    /// the main operation.
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError>;

    /// Query audit logs with optional filters.
    ///
    /// Returns events matching the filter criteria, ordered by timestamp descending.
    async fn query(&self, filter: AuditLogFilter) -> Result<Vec<AuditEvent>, AuditLogError>;

    /// Get a specific audit event by ID.
    async fn get(&self, id: AuditEventId) -> Result<AuditEvent, AuditLogError>;

    /// Count audit events matching the filter criteria.
    async fn count(&self, filter: AuditLogFilter) -> Result<u64, AuditLogError>;
}
