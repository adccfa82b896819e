//! Contractor access and negotiation protocol for jobsite work orders.
//!
//! A contractor is not a user of the system: they receive an emailed link
//! whose opaque secret resolves, server-side, to a single work order. This
//! crate implements everything between that link and the work order's
//! lifecycle:
//!
//! - [`TokenGateway`] — resolves a presented secret into an access decision,
//!   applying status-aware expiry on top of the token's own TTL/revocation.
//! - [`state_machine`] — pure legal-transition rules for work orders.
//! - [`NegotiationEngine`] — the counter-offer sub-protocol layered on the
//!   `viewed` state.
//! - [`ContractorPortal`] / [`OperatorDesk`] — the two actors' entry points,
//!   composing the above over the store traits with one audit event per
//!   state-affecting call.
//!
//! Nothing here holds state between calls; concurrency correctness rests on
//! the store's compare-and-swap keyed on the work order's `version`.

mod error;
mod gateway;
mod issue;
mod negotiation;
mod portal;
mod recording;
pub mod state_machine;

pub use error::AccessError;
pub use gateway::{AccessGrant, TokenGateway};
pub use issue::{hash_secret, mint_secret, IssuedToken, TokenIssuer, TokenPolicy};
pub use negotiation::{CounterDecision, CounterProposal, NegotiationEngine};
pub use portal::{ContractorPortal, OperatorDesk, PeekView, RespondAction};
pub use state_machine::WorkOrderEvent;
