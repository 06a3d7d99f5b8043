use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Ack, SwapRecord, SwapStatus};

// ============================================================================
// RecordStore: durable swap record persistence
// ============================================================================

/// Durable persistence for swap records, addressable by id.
///
/// Implementations must provide read-after-write consistency per id and must
/// never move a record out of a terminal status.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record.
    ///
    /// Fails with `AlreadyFinalized` if the stored record is terminal, and with
    /// `Conflict` when a `Pending` record is put over an existing id. A
    /// terminal record put over a pending one may differ only in `status`
    /// and `tx_ref`; any other change is a `Conflict`.
    async fn put(&self, record: &SwapRecord) -> Result<Ack, StoreError>;

    /// Fetch one record, `NotFound` if absent.
    async fn get(&self, id: &str) -> Result<SwapRecord, StoreError>;

    /// All records, most recent first (`created_at` desc, then id desc).
    async fn list_all(&self) -> Result<Vec<SwapRecord>, StoreError>;

    /// Move a `Pending` record to a terminal status. At most one caller wins;
    /// the others get `AlreadyFinalized`.
    async fn finalize(
        &self,
        id: &str,
        status: SwapStatus,
        tx_ref: Option<String>,
    ) -> Result<SwapRecord, StoreError>;

    /// Whether the store currently answers requests.
    async fn is_available(&self) -> bool;
}
