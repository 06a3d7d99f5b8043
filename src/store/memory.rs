//! MemoryRecordStore: an in-process `RecordStore` holding JSON documents.
//!
//! Each record sits behind its own lock so writes to distinct ids do not
//! contend, while terminal transitions on one id are serialized.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::types::{Ack, SwapRecord, SwapStatus};

use super::traits::RecordStore;

type Slot = Arc<Mutex<Value>>;

// ============================================================================
// MemoryRecordStore
// ============================================================================

/// In-memory record store.
///
/// Records are kept as self-describing JSON documents, exactly what a durable
/// backend would write. Availability can be toggled to exercise failure paths.
pub struct MemoryRecordStore {
    /// record id → document
    records: RwLock<HashMap<String, Slot>>,
    available: AtomicBool,
    sequence: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
        }
    }

    /// Simulate an outage (`false`) or recovery (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        }
    }

    fn next_tx_ref(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("memtx-{:016x}", seq)
    }

    fn slot(&self, id: &str) -> Result<Slot, StoreError> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &SwapRecord) -> Result<Ack, StoreError> {
        self.ensure_available()?;
        let doc = record.to_document()?;

        let existing = {
            let mut records = self.records.write();
            match records.entry(record.id.clone()) {
                Entry::Occupied(e) => Some(Arc::clone(e.get())),
                Entry::Vacant(v) => {
                    v.insert(Arc::new(Mutex::new(doc.clone())));
                    None
                }
            }
        };

        if let Some(slot) = existing {
            let mut current = slot.lock();
            let stored = SwapRecord::from_document(&current)?;
            if stored.is_terminal() {
                return Err(StoreError::AlreadyFinalized(record.id.clone()));
            }
            if record.status == SwapStatus::Pending {
                return Err(StoreError::Conflict(record.id.clone()));
            }
            // A terminal put over a pending record may only settle it.
            let mut settled = stored;
            settled.status = record.status;
            settled.tx_ref = record.tx_ref.clone();
            if &settled != record {
                return Err(StoreError::Conflict(record.id.clone()));
            }
            *current = settled.to_document()?;
        }

        let tx_ref = self.next_tx_ref();
        debug!(swap_id = %record.id, status = ?record.status, tx_ref = %tx_ref, "record stored");
        Ok(Ack { tx_ref })
    }

    async fn get(&self, id: &str) -> Result<SwapRecord, StoreError> {
        self.ensure_available()?;
        let slot = self.slot(id)?;
        let doc = slot.lock();
        SwapRecord::from_document(&doc)
    }

    async fn list_all(&self) -> Result<Vec<SwapRecord>, StoreError> {
        self.ensure_available()?;
        let slots: Vec<Slot> = self.records.read().values().cloned().collect();
        let mut records = slots
            .iter()
            .map(|slot| SwapRecord::from_document(&slot.lock()))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    async fn finalize(
        &self,
        id: &str,
        status: SwapStatus,
        tx_ref: Option<String>,
    ) -> Result<SwapRecord, StoreError> {
        self.ensure_available()?;
        if !status.is_terminal() {
            return Err(StoreError::Conflict(id.to_string()));
        }
        let slot = self.slot(id)?;
        let mut doc = slot.lock();
        let mut record = SwapRecord::from_document(&doc)?;
        if record.is_terminal() {
            return Err(StoreError::AlreadyFinalized(id.to_string()));
        }
        record.status = status;
        if tx_ref.is_some() {
            record.tx_ref = tx_ref;
        }
        *doc = record.to_document()?;
        debug!(swap_id = %id, status = ?status, "record finalized");
        Ok(record)
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetSymbol;
    use fhedex_crypto::{Codec, Decimal, KeyHandle};

    fn record(id: &str, created_at: i64) -> SwapRecord {
        let codec = Codec::default();
        let key = KeyHandle::generate().unwrap();
        SwapRecord {
            id: id.to_string(),
            input_token: AssetSymbol::new("ETH").unwrap(),
            output_token: AssetSymbol::new("USDC").unwrap(),
            input_amount: Decimal::new(2, 0),
            output_amount: Decimal::new(7000, 0),
            min_output_amount: Decimal::new(6965, 0),
            slippage_bps: 50,
            encrypted_input: codec.encrypt(Decimal::new(2, 0), &key).unwrap(),
            encrypted_output: codec.encrypt(Decimal::new(7000, 0), &key).unwrap(),
            created_at,
            status: SwapStatus::Pending,
            tx_ref: None,
            owner: None,
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryRecordStore::new();
        let r = record("a", 1);
        let ack = store.put(&r).await.unwrap();
        assert!(ack.tx_ref.starts_with("memtx-"));
        assert_eq!(store.get("a").await.unwrap(), r);
        assert!(matches!(store.get("b").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn pending_put_over_existing_id_conflicts() {
        let store = MemoryRecordStore::new();
        store.put(&record("a", 1)).await.unwrap();
        assert!(matches!(store.put(&record("a", 2)).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn terminal_records_are_immutable() {
        let store = MemoryRecordStore::new();
        store.put(&record("a", 1)).await.unwrap();
        let done = store
            .finalize("a", SwapStatus::Completed, Some("tx1".to_string()))
            .await
            .unwrap();
        assert_eq!(done.status, SwapStatus::Completed);
        assert_eq!(done.tx_ref.as_deref(), Some("tx1"));

        assert!(matches!(
            store.finalize("a", SwapStatus::Failed, None).await,
            Err(StoreError::AlreadyFinalized(_))
        ));
        let mut overwrite = record("a", 1);
        overwrite.status = SwapStatus::Failed;
        assert!(matches!(store.put(&overwrite).await, Err(StoreError::AlreadyFinalized(_))));
        assert_eq!(store.get("a").await.unwrap().status, SwapStatus::Completed);
    }

    #[tokio::test]
    async fn terminal_put_may_only_settle_the_record() {
        let store = MemoryRecordStore::new();
        let original = record("a", 1);
        store.put(&original).await.unwrap();

        let mut rewritten = original.clone();
        rewritten.status = SwapStatus::Completed;
        rewritten.output_amount = Decimal::new(1, 0);
        rewritten.output_token = AssetSymbol::new("BTC").unwrap();
        rewritten.encrypted_output = original.encrypted_input.clone();
        assert!(matches!(store.put(&rewritten).await, Err(StoreError::Conflict(_))));
        assert_eq!(store.get("a").await.unwrap(), original);

        let mut settled = original.clone();
        settled.status = SwapStatus::Completed;
        settled.tx_ref = Some("tx1".to_string());
        store.put(&settled).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), settled);
    }

    #[tokio::test]
    async fn finalize_rejects_pending_target() {
        let store = MemoryRecordStore::new();
        store.put(&record("a", 1)).await.unwrap();
        assert!(matches!(
            store.finalize("a", SwapStatus::Pending, None).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn list_all_is_most_recent_first() {
        let store = MemoryRecordStore::new();
        for (id, at) in [("a", 10), ("b", 30), ("c", 20), ("d", 30)] {
            store.put(&record(id, at)).await.unwrap();
        }
        let ids: Vec<String> = store.list_all().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryRecordStore::new();
        store.put(&record("a", 1)).await.unwrap();
        store.set_available(false);
        assert!(!store.is_available().await);
        assert!(matches!(store.put(&record("b", 1)).await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.get("a").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.list_all().await, Err(StoreError::Unavailable(_))));
        store.set_available(true);
        assert_eq!(store.len(), 1);
    }
}
