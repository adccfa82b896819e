//! In-memory store implementation backed by DashMap.
//!
//! This implementation is suitable for:
//! - Tests exercising the access protocol end to end
//! - Development and demos
//!
//! The work-order update is a real compare-and-swap: the DashMap entry guard
//! is held across the version check and the write, so concurrent writers
//! against the same expected version resolve to exactly one winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;

use jobsite_audit::{AuditEvent, AuditEventId, AuditLog, AuditLogError, AuditLogFilter};
use jobsite_storage::{
    AccessToken, AccessTokenId, CreateTokenParams, StoreError, TokenStore, WorkOrder,
    WorkOrderId, WorkOrderStore,
};

/// In-memory token + work-order store.
#[derive(Default)]
pub struct MemoryStore {
    tokens: DashMap<AccessTokenId, AccessToken>,
    // token_hash -> token id; hashes are unique by construction (sha-256 of
    // a fresh 32-byte secret) but collisions still map to AlreadyExists.
    hash_index: DashMap<String, AccessTokenId>,
    work_orders: DashMap<WorkOrderId, WorkOrder>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create_token(
        &self,
        params: &CreateTokenParams,
    ) -> Result<AccessToken, StoreError> {
        if self.hash_index.contains_key(&params.token_hash) {
            return Err(StoreError::AlreadyExists);
        }

        // One active token per (work_order, contractor) pair; callers revoke
        // prior tokens before issuing.
        let has_active = self.tokens.iter().any(|entry| {
            entry.work_order_id == params.work_order_id
                && entry.contractor_email == params.contractor_email
                && entry.is_active()
        });
        if has_active {
            return Err(StoreError::AlreadyExists);
        }

        let token = AccessToken {
            id: AccessTokenId::generate(),
            token_hash: params.token_hash.clone(),
            work_order_id: params.work_order_id,
            contractor_email: params.contractor_email.clone(),
            issued_at: params.issued_at,
            base_expires_at: params.base_expires_at,
            revoked_at: None,
            last_used_at: None,
        };
        self.hash_index.insert(token.token_hash.clone(), token.id);
        self.tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn get_token_by_hash(&self, token_hash: &str) -> Result<AccessToken, StoreError> {
        let id = self
            .hash_index
            .get(token_hash)
            .map(|entry| *entry)
            .ok_or(StoreError::NotFound)?;
        self.tokens
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_tokens_for_work_order(
        &self,
        work_order_id: &WorkOrderId,
    ) -> Result<Vec<AccessToken>, StoreError> {
        let mut tokens: Vec<AccessToken> = self
            .tokens
            .iter()
            .filter(|entry| entry.work_order_id == *work_order_id)
            .map(|entry| entry.clone())
            .collect();
        tokens.sort_by_key(|t| t.issued_at);
        Ok(tokens)
    }

    async fn revoke_token(
        &self,
        token_id: &AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut token = self.tokens.get_mut(token_id).ok_or(StoreError::NotFound)?;
        if token.revoked_at.is_none() {
            token.revoked_at = Some(now);
        }
        Ok(())
    }

    async fn revoke_active_tokens(
        &self,
        work_order_id: &WorkOrderId,
        contractor_email: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, StoreError> {
        let mut revoked = 0;
        for mut entry in self.tokens.iter_mut() {
            if entry.work_order_id == *work_order_id
                && entry.contractor_email == contractor_email
                && entry.is_active()
            {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn mark_token_used(
        &self,
        token_id: &AccessTokenId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut token = self.tokens.get_mut(token_id).ok_or(StoreError::NotFound)?;
        token.last_used_at = Some(now);
        Ok(())
    }
}

#[async_trait]
impl WorkOrderStore for MemoryStore {
    async fn create_work_order(&self, work_order: &WorkOrder) -> Result<(), StoreError> {
        match self.work_orders.entry(work_order.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(work_order.clone());
                Ok(())
            }
        }
    }

    async fn get_work_order(&self, id: &WorkOrderId) -> Result<WorkOrder, StoreError> {
        self.work_orders
            .get(id)
            .map(|entry| entry.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn update_work_order(
        &self,
        expected_version: i64,
        updated: &WorkOrder,
    ) -> Result<WorkOrder, StoreError> {
        // The entry guard is the CAS: version check and write happen under
        // the same shard lock.
        let mut entry = self
            .work_orders
            .get_mut(&updated.id)
            .ok_or(StoreError::NotFound)?;
        if entry.version != expected_version {
            return Err(StoreError::Conflict);
        }
        let mut next = updated.clone();
        next.version = expected_version + 1;
        *entry = next.clone();
        Ok(next)
    }
}

/// In-memory audit log; append-only vector behind a lock.
#[derive(Default)]
pub struct MemoryAuditLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(filter: &AuditLogFilter, event: &AuditEvent) -> bool {
    if let Some(work_order_id) = filter.work_order_id {
        if event.work_order_id != work_order_id.0 {
            return false;
        }
    }
    if let Some(token_id) = filter.token_id {
        if event.actor.token_id() != Some(token_id) {
            return false;
        }
    }
    if let Some(action) = filter.action {
        if event.action != action {
            return false;
        }
    }
    if let Some(result) = filter.result {
        if event.result != result {
            return false;
        }
    }
    if let Some(from) = filter.from {
        if event.timestamp < from {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if event.timestamp >= to {
            return false;
        }
    }
    true
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditLogError> {
        self.events
            .write()
            .map_err(|_| AuditLogError::Backend("audit log lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }

    async fn query(&self, filter: AuditLogFilter) -> Result<Vec<AuditEvent>, AuditLogError> {
        let events = self
            .events
            .read()
            .map_err(|_| AuditLogError::Backend("audit log lock poisoned".to_string()))?;
        let mut matching: Vec<AuditEvent> = events
            .iter()
            .filter(|event| matches(&filter, event))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = filter.offset.unwrap_or(0) as usize;
        let matching: Vec<AuditEvent> = match filter.limit {
            Some(limit) => matching.into_iter().skip(offset).take(limit as usize).collect(),
            None => matching.into_iter().skip(offset).collect(),
        };
        Ok(matching)
    }

    async fn get(&self, id: AuditEventId) -> Result<AuditEvent, AuditLogError> {
        self.events
            .read()
            .map_err(|_| AuditLogError::Backend("audit log lock poisoned".to_string()))?
            .iter()
            .find(|event| event.id == id)
            .cloned()
            .ok_or(AuditLogError::NotFound(id))
    }

    async fn count(&self, filter: AuditLogFilter) -> Result<u64, AuditLogError> {
        let events = self
            .events
            .read()
            .map_err(|_| AuditLogError::Backend("audit log lock poisoned".to_string()))?;
        Ok(events.iter().filter(|event| matches(&filter, event)).count() as u64)
    }
}
