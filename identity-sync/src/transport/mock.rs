//! In-memory daemon double.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::IdentityTransport;
use crate::error::TransportError;
use crate::types::{IdentityMutationRequest, IdentitySnapshot, IdentitySummary, TransactionId};

/// Daemon error code for an unknown identity
const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;

/// Transport operation, for call counting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Fetch,
    Submit,
    List,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    error: TransportError,
    /// Calls allowed to succeed before the failure kicks in
    after: u32,
}

/// Mock transport for testing.
///
/// Holds identity records in memory and applies submitted replace requests
/// to them, so a refresh observes the new state the way a real daemon
/// would once the transaction is accepted.
pub struct MockTransport {
    records: RwLock<HashMap<String, IdentitySnapshot>>,
    listing: RwLock<Option<Vec<IdentitySummary>>>,
    failures: RwLock<HashMap<TransportOp, InjectedFailure>>,
    submitted: RwLock<Vec<IdentityMutationRequest>>,
    fetch_calls: AtomicU32,
    submit_calls: AtomicU32,
    list_calls: AtomicU32,
    next_tx: AtomicU64,
}

impl MockTransport {
    /// Create an empty mock daemon.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            listing: RwLock::new(None),
            failures: RwLock::new(HashMap::new()),
            submitted: RwLock::new(Vec::new()),
            fetch_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            list_calls: AtomicU32::new(0),
            next_tx: AtomicU64::new(1),
        }
    }

    /// Seed an identity.
    pub fn with_identity(mut self, snapshot: IdentitySnapshot) -> Self {
        self.records
            .get_mut()
            .insert(snapshot.identity.identity_address.clone(), snapshot);
        self
    }

    /// Override what `list_identities` returns.
    pub fn with_listing(mut self, listing: Vec<IdentitySummary>) -> Self {
        *self.listing.get_mut() = Some(listing);
        self
    }

    /// Make every call of `op` fail.
    pub fn with_failure(self, op: TransportOp, error: TransportError) -> Self {
        self.with_failure_after(op, 0, error)
    }

    /// Let `after` calls of `op` succeed, then fail the rest.
    pub fn with_failure_after(mut self, op: TransportOp, after: u32, error: TransportError) -> Self {
        self.failures
            .get_mut()
            .insert(op, InjectedFailure { error, after });
        self
    }

    /// Replace an identity out from under the engine (simulates another actor).
    pub async fn put_identity(&self, snapshot: IdentitySnapshot) {
        self.records
            .write()
            .await
            .insert(snapshot.identity.identity_address.clone(), snapshot);
    }

    /// Current stored state of an identity.
    pub async fn identity(&self, address: &str) -> Option<IdentitySnapshot> {
        self.records.read().await.get(address).cloned()
    }

    /// Every replace request received, oldest first.
    pub async fn submitted(&self) -> Vec<IdentityMutationRequest> {
        self.submitted.read().await.clone()
    }

    /// Number of times `op` was called.
    pub fn call_count(&self, op: TransportOp) -> u32 {
        self.counter(op).load(Ordering::SeqCst)
    }

    fn counter(&self, op: TransportOp) -> &AtomicU32 {
        match op {
            TransportOp::Fetch => &self.fetch_calls,
            TransportOp::Submit => &self.submit_calls,
            TransportOp::List => &self.list_calls,
        }
    }

    /// Count the call and return the injected failure, if it applies.
    async fn enter(&self, op: TransportOp) -> Result<(), TransportError> {
        let previous = self.counter(op).fetch_add(1, Ordering::SeqCst);
        match self.failures.read().await.get(&op) {
            Some(failure) if previous >= failure.after => Err(failure.error.clone()),
            _ => Ok(()),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: &str) -> TransportError {
    TransportError::Daemon {
        code: RPC_INVALID_ADDRESS_OR_KEY,
        message: format!("Identity not found: {}", what),
    }
}

fn name_matches(snapshot: &IdentitySnapshot, name: &str) -> bool {
    snapshot.identity.name == name.trim_end_matches('@')
}

#[async_trait]
impl IdentityTransport for MockTransport {
    async fn fetch_identity_content(
        &self,
        address_or_name: &str,
    ) -> Result<IdentitySnapshot, TransportError> {
        self.enter(TransportOp::Fetch).await?;

        let records = self.records.read().await;
        records
            .get(address_or_name)
            .or_else(|| records.values().find(|s| name_matches(s, address_or_name)))
            .cloned()
            .ok_or_else(|| not_found(address_or_name))
    }

    async fn submit_identity_mutation(
        &self,
        request: &IdentityMutationRequest,
    ) -> Result<TransactionId, TransportError> {
        self.enter(TransportOp::Submit).await?;
        self.submitted.write().await.push(request.clone());

        let mut records = self.records.write().await;
        let snapshot = records
            .values_mut()
            .find(|s| name_matches(s, &request.name))
            .ok_or_else(|| not_found(&request.name))?;

        let txid = TransactionId(format!("{:064x}", self.next_tx.fetch_add(1, Ordering::SeqCst)));

        let identity = &mut snapshot.identity;
        identity.primary_addresses = request.primary_addresses.clone();
        identity.minimum_signatures = request.minimum_signatures;
        identity.revocation_authority = request.revocation_authority.clone();
        identity.recovery_authority = request.recovery_authority.clone();
        identity.private_address = request.private_address.clone();
        if let Some(map) = &request.content_map {
            identity.content_map = map.clone();
        }
        if let Some(multimap) = &request.content_multimap {
            identity.content_multimap = multimap.clone();
        }
        snapshot.txid = Some(txid.0.clone());
        snapshot.block_height = Some(snapshot.block_height.unwrap_or(0) + 1);

        Ok(txid)
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, TransportError> {
        self.enter(TransportOp::List).await?;

        if let Some(listing) = self.listing.read().await.as_ref() {
            return Ok(listing.clone());
        }

        let records = self.records.read().await;
        let mut summaries: Vec<_> = records
            .values()
            .map(|s| IdentitySummary {
                name: Some(s.identity.name.clone()),
                identity_address: Some(s.identity.identity_address.clone()),
                parent: Some(s.identity.parent.clone()),
                status: s.status.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentMap, IdentityRecord};

    fn snapshot(name: &str, address: &str) -> IdentitySnapshot {
        IdentitySnapshot {
            identity: IdentityRecord {
                version: 3,
                flags: 0,
                name: name.to_string(),
                identity_address: address.to_string(),
                parent: "iParent".to_string(),
                system_id: "iParent".to_string(),
                primary_addresses: vec!["RAddr".to_string()],
                minimum_signatures: 1,
                revocation_authority: address.to_string(),
                recovery_authority: address.to_string(),
                private_address: None,
                timelock: 0,
                content_map: ContentMap::new(),
                content_multimap: Default::default(),
            },
            status: Some("active".to_string()),
            block_height: Some(10),
            txid: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_by_address_and_name() {
        let mock = MockTransport::new().with_identity(snapshot("alice", "iAlice"));

        assert_eq!(mock.fetch_identity_content("iAlice").await.unwrap().identity.name, "alice");
        assert_eq!(mock.fetch_identity_content("alice@").await.unwrap().identity.name, "alice");
        assert!(matches!(
            mock.fetch_identity_content("carol@").await,
            Err(TransportError::Daemon { code: -5, .. })
        ));
        assert_eq!(mock.call_count(TransportOp::Fetch), 3);
    }

    #[tokio::test]
    async fn test_submit_applies_content() {
        let mock = MockTransport::new().with_identity(snapshot("alice", "iAlice"));
        let mut map = ContentMap::new();
        map.insert("k".into(), "v".into());

        let request = IdentityMutationRequest::carry_forward(&snapshot("alice", "iAlice").identity)
            .with_content_map(map.clone());
        let txid = mock.submit_identity_mutation(&request).await.unwrap();

        let stored = mock.identity("iAlice").await.unwrap();
        assert_eq!(stored.identity.content_map, map);
        assert_eq!(stored.txid.as_deref(), Some(txid.as_str()));
        assert_eq!(mock.submitted().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_after_n_calls() {
        let mock = MockTransport::new()
            .with_identity(snapshot("alice", "iAlice"))
            .with_failure_after(
                TransportOp::Fetch,
                1,
                TransportError::Unreachable("connection refused".into()),
            );

        assert!(mock.fetch_identity_content("iAlice").await.is_ok());
        assert!(matches!(
            mock.fetch_identity_content("iAlice").await,
            Err(TransportError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_defaults_to_records() {
        let mock = MockTransport::new()
            .with_identity(snapshot("bob", "iBob"))
            .with_identity(snapshot("alice", "iAlice"));

        let names: Vec<_> = mock
            .list_identities()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
