//! Daemon transport abstraction.
//!
//! The engine talks to the daemon only through [`IdentityTransport`]:
//! - JSON-RPC over HTTP against the daemon's RPC port
//! - In-memory mock for tests and dry runs

pub mod mock;
pub mod rpc;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::types::{IdentityMutationRequest, IdentitySnapshot, IdentitySummary, TransactionId};

pub use mock::{MockTransport, TransportOp};
pub use rpc::RpcTransport;

/// Request/response access to the identity daemon.
///
/// Each call is a single round-trip. Implementations do not retry.
#[async_trait]
pub trait IdentityTransport: Send + Sync {
    /// Fetch the full current record, including both content stores
    async fn fetch_identity_content(
        &self,
        address_or_name: &str,
    ) -> Result<IdentitySnapshot, TransportError>;

    /// Submit a full replace request
    async fn submit_identity_mutation(
        &self,
        request: &IdentityMutationRequest,
    ) -> Result<TransactionId, TransportError>;

    /// Raw enumeration of the wallet's identities, unfiltered
    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, TransportError>;
}
