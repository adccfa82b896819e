//! End-to-end protocol walk over the in-memory backend: issue a link, view,
//! negotiate, work, inspect, close, and verify the audit trail.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use jobsite_access::{
    AccessError, ContractorPortal, CounterDecision, CounterProposal, OperatorDesk,
    RespondAction, TokenPolicy,
};
use jobsite_audit::{AuditAction, AuditLog, AuditLogFilter};
use jobsite_storage::{
    CounterOfferStatus, CreateWorkOrderParams, OperatorId, TokenStore, WorkOrderStatus,
    WorkOrderStore,
};
use jobsite_store_memory::{MemoryAuditLog, MemoryStore};

struct Harness {
    store: Arc<MemoryStore>,
    audit: Arc<MemoryAuditLog>,
    portal: ContractorPortal,
    desk: OperatorDesk,
    operator: OperatorId,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    Harness {
        portal: ContractorPortal::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::clone(&store) as Arc<dyn WorkOrderStore>,
            Arc::clone(&audit) as Arc<dyn AuditLog>,
        ),
        desk: OperatorDesk::new(
            Arc::clone(&store) as Arc<dyn TokenStore>,
            Arc::clone(&store) as Arc<dyn WorkOrderStore>,
            Arc::clone(&audit) as Arc<dyn AuditLog>,
            TokenPolicy::default(),
        ),
        store,
        audit,
        operator: OperatorId::generate(),
    }
}

#[tokio::test]
async fn negotiated_order_from_draft_to_closed() {
    let h = harness();
    let now = Utc::now();

    // Operator drafts and sends; the contractor gets a link.
    let draft = h
        .desk
        .create_draft(
            CreateWorkOrderParams {
                operator_id: h.operator,
                title: "Replace rooftop HVAC unit".to_string(),
                estimated_cost_cents: 500_000,
                requested_start_date: Some(NaiveDate::from_ymd_opt(2026, 10, 5).unwrap()),
                requested_end_date: Some(NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()),
                acceptance_deadline: Some(now + Duration::days(7)),
            },
            now,
        )
        .await
        .unwrap();
    let (sent, issued) = h
        .desk
        .send(&h.operator, &draft.id, draft.version, "crew@example.com", now)
        .await
        .unwrap();
    assert_eq!(sent.status, WorkOrderStatus::Sent);

    // First peek renders, commits nothing; the deadline is surfaced but
    // does not gate access.
    let view = h.portal.peek(&issued.secret, &draft.id, now).await.unwrap();
    assert_eq!(view.work_order.status, WorkOrderStatus::Sent);
    assert_eq!(view.work_order.acceptance_deadline, Some(now + Duration::days(7)));

    // Contractor counters at 4500; the first consume also views the order.
    let pending = h
        .portal
        .respond(
            &issued.secret,
            &draft.id,
            RespondAction::CounterOffer(CounterProposal {
                proposed_cost_cents: Some(450_000),
                contractor_notes: Some("crane hire already covered by another job".to_string()),
                ..Default::default()
            }),
            now,
        )
        .await
        .unwrap();
    assert_eq!(pending.status, WorkOrderStatus::Viewed);
    assert_eq!(pending.counter_offer_status, CounterOfferStatus::Pending);
    assert_eq!(pending.estimated_cost_cents, 500_000);

    // Operator approves: promotion and acceptance land together.
    let accepted = h
        .desk
        .decide_counter(
            &h.operator,
            &draft.id,
            pending.version,
            CounterDecision::Approved,
            Some("works for the budget".to_string()),
            now,
        )
        .await
        .unwrap();
    assert_eq!(accepted.status, WorkOrderStatus::Accepted);
    assert_eq!(accepted.estimated_cost_cents, 450_000);
    assert_eq!(accepted.counter_offer_status, CounterOfferStatus::Approved);
    assert!(accepted.accepted_at.is_some());

    // Work happens through the same link.
    let started = h.portal.start(&issued.secret, &draft.id, now).await.unwrap();
    assert_eq!(started.status, WorkOrderStatus::InProgress);
    let done = h.portal.mark_done(&issued.secret, &draft.id, now).await.unwrap();
    assert_eq!(done.status, WorkOrderStatus::Done);

    // Operator inspects and closes; the link dies with the closed kind.
    let inspected = h
        .desk
        .inspect(&h.operator, &draft.id, done.version, now)
        .await
        .unwrap();
    let closed = h
        .desk
        .close(&h.operator, &draft.id, inspected.version, now)
        .await
        .unwrap();
    assert_eq!(closed.status, WorkOrderStatus::Closed);

    let err = h
        .portal
        .peek(&issued.secret, &draft.id, now)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "work_order_closed");

    // One audit event per state-affecting call, in order of interest.
    for (action, expected) in [
        (AuditAction::WorkOrderSend, 1),
        (AuditAction::TokenIssue, 1),
        (AuditAction::WorkOrderView, 1),
        (AuditAction::CounterOfferSubmit, 1),
        (AuditAction::CounterOfferApprove, 1),
        (AuditAction::WorkOrderStart, 1),
        (AuditAction::WorkOrderComplete, 1),
        (AuditAction::WorkOrderInspect, 1),
        (AuditAction::WorkOrderClose, 1),
        (AuditAction::TokenRevoke, 1),
    ] {
        let count = h
            .audit
            .count(AuditLogFilter::new().action(action))
            .await
            .unwrap();
        assert_eq!(count, expected, "unexpected count for {action}");
    }
}

#[tokio::test]
async fn rejected_counter_allows_plain_accept_fallback() {
    let h = harness();
    let now = Utc::now();

    let draft = h
        .desk
        .create_draft(
            CreateWorkOrderParams {
                operator_id: h.operator,
                title: "Strip and repaint stairwell".to_string(),
                estimated_cost_cents: 90_000,
                requested_start_date: None,
                requested_end_date: None,
                acceptance_deadline: None,
            },
            now,
        )
        .await
        .unwrap();
    let (_, issued) = h
        .desk
        .send(&h.operator, &draft.id, draft.version, "painters@example.com", now)
        .await
        .unwrap();

    let pending = h
        .portal
        .respond(
            &issued.secret,
            &draft.id,
            RespondAction::CounterOffer(CounterProposal {
                proposed_cost_cents: Some(120_000),
                ..Default::default()
            }),
            now,
        )
        .await
        .unwrap();

    let declined = h
        .desk
        .decide_counter(
            &h.operator,
            &draft.id,
            pending.version,
            CounterDecision::Rejected,
            Some("above the approved budget".to_string()),
            now,
        )
        .await
        .unwrap();
    assert_eq!(declined.status, WorkOrderStatus::Viewed);
    assert_eq!(declined.counter_offer_status, CounterOfferStatus::Rejected);

    // Contractor falls back to accepting the original terms.
    let accepted = h
        .portal
        .respond(
            &issued.secret,
            &draft.id,
            RespondAction::Accept {
                confirmed_cost_cents: Some(90_000),
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(accepted.status, WorkOrderStatus::Accepted);
    assert_eq!(accepted.estimated_cost_cents, 90_000);
    // The rejected proposal stays on the row as history.
    assert_eq!(accepted.proposed_cost_cents, Some(120_000));
}

#[tokio::test]
async fn expired_link_and_reissue_recovery() {
    let h = harness();
    let now = Utc::now();

    let draft = h
        .desk
        .create_draft(
            CreateWorkOrderParams {
                operator_id: h.operator,
                title: "Annual sprinkler test".to_string(),
                estimated_cost_cents: 30_000,
                requested_start_date: None,
                requested_end_date: None,
                acceptance_deadline: None,
            },
            now,
        )
        .await
        .unwrap();
    let (sent, issued) = h
        .desk
        .send(&h.operator, &draft.id, draft.version, "crew@example.com", now)
        .await
        .unwrap();

    // Three weeks later the original link has expired with the expired
    // kind, so the UI may offer "request a new link".
    let later = now + Duration::days(21);
    let err = h
        .portal
        .peek(&issued.secret, &sent.id, later)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::TokenExpired));
    assert_eq!(err.kind(), "expired");

    // The operator reissues; the fresh link works, the old one is revoked.
    let fresh = h
        .desk
        .reissue_link(&h.operator, &sent.id, "crew@example.com", later)
        .await
        .unwrap();
    let view = h.portal.peek(&fresh.secret, &sent.id, later).await.unwrap();
    assert_eq!(view.work_order.status, WorkOrderStatus::Sent);

    let err = h
        .portal
        .peek(&issued.secret, &sent.id, later)
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::TokenRevoked));

    // The stored rows keep the full history: one revoked, one active.
    let tokens = h.store.list_tokens_for_work_order(&sent.id).await.unwrap();
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens.iter().filter(|t| t.is_active()).count(), 1);
}

#[tokio::test]
async fn two_tabs_double_submit_is_caught() {
    let h = harness();
    let now = Utc::now();

    let draft = h
        .desk
        .create_draft(
            CreateWorkOrderParams {
                operator_id: h.operator,
                title: "Fence repair along east lot".to_string(),
                estimated_cost_cents: 60_000,
                requested_start_date: None,
                requested_end_date: None,
                acceptance_deadline: None,
            },
            now,
        )
        .await
        .unwrap();
    let (_, issued) = h
        .desk
        .send(&h.operator, &draft.id, draft.version, "crew@example.com", now)
        .await
        .unwrap();

    // Tab one submits a counter-offer.
    let pending = h
        .portal
        .respond(
            &issued.secret,
            &draft.id,
            RespondAction::CounterOffer(CounterProposal {
                proposed_cost_cents: Some(55_000),
                ..Default::default()
            }),
            now,
        )
        .await
        .unwrap();
    assert!(pending.has_pending_counter());

    // Tab two, unaware, submits another one. The retry-once re-read sees
    // the pending proposal and the caller gets the typed outcome, not a
    // second proposal.
    let err = h
        .portal
        .respond(
            &issued.secret,
            &draft.id,
            RespondAction::CounterOffer(CounterProposal {
                proposed_cost_cents: Some(52_000),
                ..Default::default()
            }),
            now,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::AlreadyPending));

    let stored = h.store.get_work_order(&draft.id).await.unwrap();
    assert_eq!(stored.proposed_cost_cents, Some(55_000));

    let submits = h
        .audit
        .count(AuditLogFilter::new().action(AuditAction::CounterOfferSubmit))
        .await
        .unwrap();
    assert_eq!(submits, 1);
}
