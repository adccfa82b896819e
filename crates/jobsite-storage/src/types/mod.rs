//! Row types and strongly-typed identifiers shared by all backends.

mod ids;
mod tokens;
mod work_orders;

pub use ids::{AccessTokenId, OperatorId, WorkOrderId};
pub use tokens::{AccessToken, CreateTokenParams};
pub use work_orders::{
    CounterOfferStatus, CreateWorkOrderParams, WorkOrder, WorkOrderStatus,
};
