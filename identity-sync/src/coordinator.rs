//! Identity update coordinator.
//!
//! Every mutation runs one cycle:
//!
//! ```text
//! Idle → Fetching → Merging → Submitting → Refreshing → Idle
//!           │          │           │
//!           └──────────┴───────────┴──→ Failed
//! ```
//!
//! Batch replacement skips `Merging`. Local validation happens while still
//! `Idle`, so invalid input never reaches the transport.
//!
//! # Concurrency
//!
//! Fetching and Submitting are separate round-trips and the daemon offers
//! no version token or conditional write. A change made by anyone else
//! between the two is overwritten by this cycle's carried-forward snapshot.
//! Cycles are not serialized against each other, not even for the same
//! identity. A failed cycle is not resumed; retrying means starting a new
//! cycle, which fetches fresh state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::edit::{ContentMapEdit, EditKind, MultiMapEdit};
use crate::error::{Result, SyncError};
use crate::filter;
use crate::history::{HistoryEntry, Operation, SyncHistory};
use crate::merge::{merge_content_map, merge_multimap};
use crate::transport::IdentityTransport;
use crate::types::{
    ContentMap, ContentMultiMap, IdentityMutationRequest, IdentitySnapshot, IdentitySummary,
    TransactionId,
};

/// Phase of a synchronization cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Idle,
    Fetching,
    Merging,
    Submitting,
    Refreshing,
    /// Terminal for the cycle
    Failed,
}

impl CyclePhase {
    pub fn can_transition_to(self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        match (self, next) {
            (Idle, Fetching) => true,
            (Fetching, Merging) | (Fetching, Submitting) => true,
            (Merging, Submitting) => true,
            (Submitting, Refreshing) => true,
            (Refreshing, Idle) => true,
            (Failed, _) | (Idle, _) => false,
            (_, Failed) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Submitting => "submitting",
            Self::Refreshing => "refreshing",
            Self::Failed => "failed",
        }
    }
}

/// Result of a cycle whose replace request was accepted.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub txid: TransactionId,
    /// Authoritative post-mutation state, if the refresh succeeded
    pub record: Option<IdentitySnapshot>,
    /// Always a [`SyncError::RefreshFailed`]; the mutation still stands
    pub refresh_error: Option<SyncError>,
    /// Phases the cycle went through, starting at `Idle`
    pub phases: Vec<CyclePhase>,
}

impl UpdateOutcome {
    pub fn is_fully_refreshed(&self) -> bool {
        self.record.is_some() && self.refresh_error.is_none()
    }
}

/// Content supplied wholesale by a batch import.
///
/// Serializes with the daemon's member names so an exported file can be
/// fed straight back in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchContent {
    #[serde(rename = "contentmap", default, skip_serializing_if = "Option::is_none")]
    pub content_map: Option<ContentMap>,
    #[serde(rename = "contentmultimap", default, skip_serializing_if = "Option::is_none")]
    pub content_multimap: Option<ContentMultiMap>,
}

impl BatchContent {
    pub fn content_map(map: ContentMap) -> Self {
        Self {
            content_map: Some(map),
            content_multimap: None,
        }
    }
}

/// What a cycle turns the fetched snapshot into
enum CyclePlan<'a> {
    ContentMap(&'a ContentMapEdit),
    MultiMap(&'a MultiMapEdit),
    Batch(BatchContent),
}

impl CyclePlan<'_> {
    fn validate(&self) -> Result<()> {
        match self {
            CyclePlan::ContentMap(edit) => edit.validate(),
            CyclePlan::MultiMap(edit) => edit.validate(),
            CyclePlan::Batch(content) => {
                if content.content_map.is_none() && content.content_multimap.is_none() {
                    return Err(SyncError::InvalidEdit(
                        "batch import carries neither a content map nor a content multimap".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    fn operation(&self) -> Operation {
        match self {
            CyclePlan::ContentMap(_) => Operation::ContentMapEdit,
            CyclePlan::MultiMap(_) => Operation::MultiMapEdit,
            CyclePlan::Batch(_) => Operation::BatchReplace,
        }
    }

    fn edit_kind(&self) -> Option<EditKind> {
        match self {
            CyclePlan::ContentMap(edit) => Some(edit.kind()),
            CyclePlan::MultiMap(edit) => Some(edit.kind()),
            CyclePlan::Batch(_) => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CyclePlan::ContentMap(_) => "content_map_edit",
            CyclePlan::MultiMap(_) => "multimap_edit",
            CyclePlan::Batch(_) => "batch_replace",
        }
    }
}

/// Phase tracker for one cycle
struct Cycle<'a> {
    address: &'a str,
    operation: &'static str,
    phases: Vec<CyclePhase>,
}

impl<'a> Cycle<'a> {
    fn start(address: &'a str, operation: &'static str) -> Self {
        Self {
            address,
            operation,
            phases: vec![CyclePhase::Idle],
        }
    }

    fn current(&self) -> CyclePhase {
        self.phases.last().copied().unwrap_or(CyclePhase::Idle)
    }

    fn advance(&mut self, next: CyclePhase) {
        let from = self.current();
        debug_assert!(
            from.can_transition_to(next),
            "illegal cycle transition {:?} -> {:?}",
            from,
            next
        );
        debug!(
            address = self.address,
            operation = self.operation,
            from = from.as_str(),
            to = next.as_str(),
            "cycle transition"
        );
        self.phases.push(next);
    }

    fn fail(&mut self, error: SyncError) -> SyncError {
        warn!(
            address = self.address,
            operation = self.operation,
            phase = self.current().as_str(),
            error = %error,
            "synchronization cycle failed"
        );
        self.advance(CyclePhase::Failed);
        error
    }
}

/// Entry point for identity content synchronization.
///
/// The only component that submits replace requests to the daemon.
pub struct IdentitySyncEngine {
    transport: Arc<dyn IdentityTransport>,
    config: SyncConfig,
    history: Option<Arc<SyncHistory>>,
}

impl IdentitySyncEngine {
    /// Create an engine over the given transport with default config.
    pub fn new(transport: Arc<dyn IdentityTransport>) -> Self {
        Self {
            transport,
            config: SyncConfig::default(),
            history: None,
        }
    }

    /// Create with configuration.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every finished cycle, failed or not, into `history`.
    ///
    /// The engine only writes to it.
    pub fn with_history(mut self, history: Arc<SyncHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn history(&self) -> Option<&Arc<SyncHistory>> {
        self.history.as_ref()
    }

    /// Fetch the authoritative current state of an identity.
    pub async fn fetch_snapshot(&self, address_or_name: &str) -> Result<IdentitySnapshot> {
        Ok(self.transport.fetch_identity_content(address_or_name).await?)
    }

    /// Apply one edit to the flat content map.
    pub async fn apply_content_map_edit(
        &self,
        address: &str,
        edit: &ContentMapEdit,
    ) -> Result<UpdateOutcome> {
        self.run_cycle(address, CyclePlan::ContentMap(edit)).await
    }

    /// Apply one edit to the nested content multimap.
    pub async fn apply_content_multimap_edit(
        &self,
        address: &str,
        edit: &MultiMapEdit,
    ) -> Result<UpdateOutcome> {
        self.run_cycle(address, CyclePlan::MultiMap(edit)).await
    }

    /// Replace the whole content map with `map`.
    ///
    /// The map is submitted as given; key format and values are the
    /// caller's responsibility.
    pub async fn batch_replace_content_map(
        &self,
        address: &str,
        map: ContentMap,
    ) -> Result<UpdateOutcome> {
        self.batch_replace(address, BatchContent::content_map(map)).await
    }

    /// Replace the content map and/or multimap wholesale.
    pub async fn batch_replace(&self, address: &str, content: BatchContent) -> Result<UpdateOutcome> {
        self.run_cycle(address, CyclePlan::Batch(content)).await
    }

    /// List identities with ticket/lottery names removed.
    pub async fn list_filtered_identities(&self) -> Result<Vec<IdentitySummary>> {
        let identities = self.transport.list_identities().await?;
        if !self.config.filter.enabled {
            return Ok(identities);
        }
        Ok(filter::filter(identities))
    }

    async fn run_cycle(&self, address: &str, plan: CyclePlan<'_>) -> Result<UpdateOutcome> {
        let entry = HistoryEntry::new(address, plan.operation(), plan.edit_kind(), Utc::now());
        let result = self.execute_cycle(address, plan).await;
        if let Some(history) = &self.history {
            history.record(entry.finish(&result)).await;
        }
        result
    }

    async fn execute_cycle(&self, address: &str, plan: CyclePlan<'_>) -> Result<UpdateOutcome> {
        let mut cycle = Cycle::start(address, plan.label());

        plan.validate()?;

        cycle.advance(CyclePhase::Fetching);
        let snapshot = match self.transport.fetch_identity_content(address).await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(cycle.fail(e.into())),
        };
        let identity = &snapshot.identity;
        let request = IdentityMutationRequest::carry_forward(identity);

        let request = match plan {
            CyclePlan::ContentMap(edit) => {
                cycle.advance(CyclePhase::Merging);
                match merge_content_map(&identity.content_map, edit) {
                    Ok(map) => {
                        if map == identity.content_map {
                            debug!(address, key = edit.target_key(), "content map edit is a no-op");
                        }
                        request.with_content_map(map)
                    }
                    Err(e) => return Err(cycle.fail(e)),
                }
            }
            CyclePlan::MultiMap(edit) => {
                cycle.advance(CyclePhase::Merging);
                match merge_multimap(&identity.content_multimap, edit) {
                    Ok(multimap) => request.with_content_multimap(multimap),
                    Err(e) => return Err(cycle.fail(e)),
                }
            }
            CyclePlan::Batch(content) => {
                let mut request = request;
                request.content_map = content.content_map;
                request.content_multimap = content.content_multimap;
                request
            }
        };

        cycle.advance(CyclePhase::Submitting);
        let txid = match self.transport.submit_identity_mutation(&request).await {
            Ok(txid) => txid,
            Err(e) => return Err(cycle.fail(e.into())),
        };
        info!(
            address,
            name = %request.name,
            operation = cycle.operation,
            txid = %txid,
            "identity update submitted"
        );

        // The daemon is the source of truth; re-read rather than trusting
        // the merged request body.
        cycle.advance(CyclePhase::Refreshing);
        let (record, refresh_error) = match self
            .transport
            .fetch_identity_content(&identity.identity_address)
            .await
        {
            Ok(fresh) => (Some(fresh), None),
            Err(source) => {
                warn!(address, txid = %txid, error = %source, "refresh after update failed");
                let err = SyncError::RefreshFailed {
                    txid: txid.clone(),
                    source,
                };
                (None, Some(err))
            }
        };
        cycle.advance(CyclePhase::Idle);

        Ok(UpdateOutcome {
            txid,
            record,
            refresh_error,
            phases: cycle.phases,
        })
    }
}
