//! Identity Sync - content map synchronization for replace-only daemons
//!
//! The identity daemon has no partial-update call: the only way to change
//! an identity's content map or content multimap is to resubmit the whole
//! field together with every control field of the record. This crate turns
//! single local edits into that read-modify-write cycle:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          IdentitySyncEngine              │
//! │  fetch → merge → submit → refresh        │
//! └───────┬──────────────────────┬───────────┘
//!         │                      │
//!         ▼                      ▼
//! ┌───────────────┐      ┌───────────────────┐
//! │ merge engines │      │ IdentityTransport │
//! │ (pure)        │      │ (RPC / mock)      │
//! └───────────────┘      └───────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use identity_sync::{ContentMapEdit, IdentitySyncEngine, RpcConfig, RpcTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = RpcTransport::new(&RpcConfig::default())?;
//! let engine = IdentitySyncEngine::new(Arc::new(transport));
//!
//! let outcome = engine
//!     .apply_content_map_edit(
//!         "alice@",
//!         &ContentMapEdit::add("iK7a5JNJnbeuYWVHCDRpJosj3irGJ5Qa8c", "00ff"),
//!     )
//!     .await?;
//! println!("submitted {}", outcome.txid);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod edit;
pub mod error;
pub mod filter;
pub mod history;
pub mod merge;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use config::{DaemonConf, FilterConfig, RpcConfig, SyncConfig};
pub use coordinator::{BatchContent, CyclePhase, IdentitySyncEngine, UpdateOutcome};
pub use edit::{ContentMapEdit, EditKind, MultiMapEdit};
pub use error::{ConfigError, Result, SyncError, TransportError};
pub use filter::TicketPattern;
pub use history::{HistoryEntry, Operation, SavedKeys, SyncHistory};
pub use transport::{IdentityTransport, MockTransport, RpcTransport, TransportOp};
pub use types::*;
