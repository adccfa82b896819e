//! Error taxonomy for the access protocol.
//!
//! Everything except `Store` is an expected, typed outcome the caller maps
//! to an actionable message. `Store` is the one infrastructure class:
//! persistence unavailable, retried by the caller, never interpreted here.

use thiserror::Error;

use jobsite_storage::{StoreError, WorkOrderStatus};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("token not found")]
    TokenNotFound,
    #[error("token revoked")]
    TokenRevoked,
    #[error("token expired")]
    TokenExpired,
    #[error("work order not found")]
    WorkOrderNotFound,
    /// Status-derived invalidity, distinct from token expiry: the order will
    /// never reopen, so "request a new link" is the wrong advice.
    #[error("work order is closed to contractor access")]
    WorkOrderClosed,
    #[error("event {event} is not legal in status {status}")]
    IllegalTransition {
        status: WorkOrderStatus,
        event: &'static str,
    },
    #[error("a counter-offer is already awaiting a decision")]
    AlreadyPending,
    #[error("no counter-offer is awaiting a decision")]
    NothingPending,
    #[error("terms differ from the offer; submit a counter-offer instead")]
    UseCounterOfferInstead,
    #[error("the work order changed since it was read")]
    VersionConflict,
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(StoreError),
}

impl AccessError {
    /// Machine-readable kind for the presentation layer. Peek callers only
    /// ever see `not_found | expired | revoked | work_order_closed`.
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::TokenNotFound | AccessError::WorkOrderNotFound => "not_found",
            AccessError::TokenRevoked => "revoked",
            AccessError::TokenExpired => "expired",
            AccessError::WorkOrderClosed => "work_order_closed",
            AccessError::IllegalTransition { .. } => "illegal_transition",
            AccessError::AlreadyPending => "already_pending",
            AccessError::NothingPending => "nothing_pending",
            AccessError::UseCounterOfferInstead => "use_counter_offer_instead",
            AccessError::VersionConflict => "version_conflict",
            AccessError::Validation(_) => "validation",
            AccessError::Store(_) => "store_unavailable",
        }
    }

    /// Map a store failure from a work-order write. `Conflict` is the CAS
    /// losing, which has its own typed outcome.
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AccessError::VersionConflict,
            StoreError::NotFound => AccessError::WorkOrderNotFound,
            other => AccessError::Store(other),
        }
    }
}
