//! Encryption key provider seam.

use std::sync::Arc;

use fhedex_crypto::KeyHandle;

use crate::error::Result;

/// Issues the key swaps are encrypted under.
pub trait KeyProvider: Send + Sync {
    fn encryption_key(&self) -> Result<Arc<KeyHandle>>;
}

/// A provider holding one key for its lifetime.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: Arc<KeyHandle>,
}

impl StaticKeyProvider {
    pub fn new(key: KeyHandle) -> Self {
        Self { key: Arc::new(key) }
    }

    /// Provider with a freshly generated random key.
    pub fn generate() -> Result<Self> {
        Ok(Self::new(KeyHandle::generate()?))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn encryption_key(&self) -> Result<Arc<KeyHandle>> {
        Ok(Arc::clone(&self.key))
    }
}
