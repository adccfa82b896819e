//! Audit emission helper.

use tracing::warn;

use jobsite_audit::{AuditEvent, AuditLog};

/// Record an audit event; failures are logged and swallowed so they never
/// fail the audited operation.
pub(crate) async fn record(audit: &dyn AuditLog, event: AuditEvent) {
    let action = event.action;
    if let Err(err) = audit.record(event).await {
        warn!(action = %action, error = %err, "failed to record audit event");
    }
}
