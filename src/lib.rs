//! Encrypted swap pipeline.
//!
//! A plaintext trade request is encrypted, converted between assets directly
//! on ciphertext, persisted as a durable record, and later opened only by a
//! principal that answers a signed challenge.

pub mod config;
pub mod error;
pub mod keys;
pub mod oracle;
pub mod orchestrator;
pub mod store;
pub mod types;

pub use config::SwapConfig;
pub use error::{Result, StoreError, SwapError, SwapFailure};
pub use keys::{KeyProvider, StaticKeyProvider};
pub use oracle::RateTable;
pub use orchestrator::{OrchestratorOptions, ProgressCallback, SwapOrchestrator};
pub use store::{MemoryRecordStore, RecordStore};
pub use types::{
    AssetSymbol, Ack, CiphertextField, SwapProgress, SwapQuote, SwapRecord, SwapRequest,
    SwapStage, SwapStatus,
};

pub use fhedex_auth as auth;
pub use fhedex_crypto as crypto;
