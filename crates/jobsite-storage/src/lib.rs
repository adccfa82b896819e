//! Storage abstraction for jobsite.
//!
//! Backend crates (e.g., jobsite-store-memory, a future SQL store) implement
//! the traits in [`store`] so the access-protocol crate doesn't depend on any
//! specific database engine or schema details.

use thiserror::Error;

mod store;
pub mod types;

pub use store::{TokenStore, WorkOrderStore};
#[cfg(feature = "test-support")]
pub use store::{MockTokenStore, MockWorkOrderStore};
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// A compare-and-swap write lost: the persisted version moved since the
    /// caller read its snapshot.
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
