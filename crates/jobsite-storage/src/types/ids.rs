//! Strongly-typed identifiers (avoid mixing strings/UUIDs arbitrarily).

use uuid::Uuid;

/// Work order identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkOrderId(pub Uuid);

/// Access token identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccessTokenId(pub Uuid);

/// Operator (back-office user) identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OperatorId(pub Uuid);

impl WorkOrderId {
    /// Generate a new time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl AccessTokenId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl OperatorId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for WorkOrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for AccessTokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
