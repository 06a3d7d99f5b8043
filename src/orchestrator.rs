//! SwapOrchestrator: drives a swap through encrypt → compute → persist → confirm.
//!
//! Per swap: `Draft → Encrypting → Computing → Persisting → {Completed, Failed}`.
//! A request rejected in `Draft` never produces a ciphertext and never
//! reaches the store.

use std::sync::Arc;

use fhedex_auth::{
    AuthorizationChallenge, AuthorizationGate, DecryptCapability, GateOptions, SystemClock,
};
use fhedex_crypto::{Codec, Decimal, RateEngine, RateProvider};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SwapConfig;
use crate::error::{Result, StoreError, SwapError, SwapFailure};
use crate::keys::KeyProvider;
use crate::store::RecordStore;
use crate::types::{
    min_output_amount, CiphertextField, SwapProgress, SwapQuote, SwapRecord, SwapRequest,
    SwapStage, SwapStatus, MAX_SLIPPAGE_BPS,
};

/// Progress callback, invoked on every stage transition.
pub type ProgressCallback = Arc<dyn Fn(&SwapProgress) + Send + Sync>;

// ============================================================================
// OrchestratorOptions
// ============================================================================

/// Configuration for `SwapOrchestrator`.
pub struct OrchestratorOptions {
    pub config: SwapConfig,
    pub keys: Arc<dyn KeyProvider>,
    pub rates: Arc<dyn RateProvider>,
    pub store: Arc<dyn RecordStore>,
    /// Authorization gate for decryption. Built from `config` with the system
    /// clock when `None`.
    pub gate: Option<Arc<AuthorizationGate>>,
    pub on_progress: Option<ProgressCallback>,
}

// ============================================================================
// SwapOrchestrator
// ============================================================================

/// Runs swaps independently; safe to share across tasks.
pub struct SwapOrchestrator {
    config: SwapConfig,
    codec: Codec,
    engine: RateEngine,
    keys: Arc<dyn KeyProvider>,
    rates: Arc<dyn RateProvider>,
    store: Arc<dyn RecordStore>,
    gate: Arc<AuthorizationGate>,
    on_progress: Option<ProgressCallback>,
    permits: Semaphore,
}

impl SwapOrchestrator {
    pub fn new(options: OrchestratorOptions) -> Result<Self> {
        options.config.validate()?;
        if options.config.max_concurrent_swaps > Semaphore::MAX_PERMITS {
            return Err(SwapError::Config(format!(
                "max_concurrent_swaps exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }
        let codec = Codec::default();
        let engine = RateEngine::new(codec.clone(), options.config.unknown_symbol_policy);
        let gate = options.gate.unwrap_or_else(|| {
            Arc::new(AuthorizationGate::new(GateOptions {
                validity_window_secs: options.config.challenge_validity_secs,
                capability_ttl_secs: options.config.capability_ttl_secs,
                max_outstanding_challenges: options.config.max_outstanding_challenges,
                clock: Arc::new(SystemClock),
            }))
        });
        let permits = Semaphore::new(options.config.max_concurrent_swaps);

        Ok(Self {
            config: options.config,
            codec,
            engine,
            keys: options.keys,
            rates: options.rates,
            store: options.store,
            gate,
            on_progress: options.on_progress,
            permits,
        })
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    /// The gate that issues and verifies decryption challenges.
    pub fn gate(&self) -> &Arc<AuthorizationGate> {
        &self.gate
    }

    // -----------------------------------------------------------------------
    // Quote
    // -----------------------------------------------------------------------

    /// Preview the plaintext outcome of `request` without encrypting anything.
    ///
    /// Uses the same arithmetic as the encrypted path, so a swap executed
    /// against unchanged rates yields exactly `output_amount`.
    pub fn quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        self.validate(request)?;
        let (input, output) = (request.input_token.as_str(), request.output_token.as_str());
        let output_amount =
            self.engine
                .preview(request.input_amount, input, output, self.rates.as_ref())?;
        let rate = self
            .engine
            .preview(Decimal::ONE, input, output, self.rates.as_ref())?;

        Ok(SwapQuote {
            input_token: request.input_token.clone(),
            output_token: request.output_token.clone(),
            input_amount: request.input_amount,
            output_amount,
            min_output_amount: min_output_amount(output_amount, request.slippage_bps),
            rate,
        })
    }

    // -----------------------------------------------------------------------
    // Execute
    // -----------------------------------------------------------------------

    /// Run one swap to a terminal state.
    ///
    /// Returns the `Completed` record, or the stage and reason the swap failed.
    pub async fn execute(&self, request: SwapRequest) -> std::result::Result<SwapRecord, SwapFailure> {
        let swap_id = new_swap_id();
        self.emit(&swap_id, SwapStage::Draft, None);

        if let Err(e) = self.validate(&request) {
            debug!(swap_id = %swap_id, error = %e, "swap request rejected");
            return Err(SwapFailure::new(SwapStage::Draft, None, e));
        }

        let _permit = self.permits.acquire().await.map_err(|_| {
            SwapFailure::new(
                SwapStage::Draft,
                None,
                SwapError::Config("swap permits closed".to_string()),
            )
        })?;

        // Encrypting
        self.emit(&swap_id, SwapStage::Encrypting, None);
        let key = self
            .keys
            .encryption_key()
            .map_err(|e| self.fail(&swap_id, SwapStage::Encrypting, None, e))?;
        let encrypted_input = self
            .codec
            .encrypt(request.input_amount, &key)
            .map_err(|e| self.fail(&swap_id, SwapStage::Encrypting, None, e.into()))?;

        // Computing
        self.emit(&swap_id, SwapStage::Computing, None);
        let (input, output) = (request.input_token.as_str(), request.output_token.as_str());
        let encrypted_output = self
            .engine
            .compute_rate(&encrypted_input, input, output, self.rates.as_ref())
            .map_err(|e| self.fail(&swap_id, SwapStage::Computing, None, e.into()))?;
        let output_amount = self
            .engine
            .preview(request.input_amount, input, output, self.rates.as_ref())
            .map_err(|e| self.fail(&swap_id, SwapStage::Computing, None, e.into()))?;

        // Persisting
        self.emit(&swap_id, SwapStage::Persisting, None);
        let record = SwapRecord {
            id: swap_id.clone(),
            input_token: request.input_token,
            output_token: request.output_token,
            input_amount: request.input_amount,
            output_amount,
            min_output_amount: min_output_amount(output_amount, request.slippage_bps),
            slippage_bps: request.slippage_bps,
            encrypted_input,
            encrypted_output,
            created_at: chrono::Utc::now().timestamp(),
            status: SwapStatus::Pending,
            tx_ref: None,
            owner: request.owner,
        };
        debug!(
            swap_id = %swap_id,
            encrypted_input = %record.encrypted_input.fingerprint(),
            encrypted_output = %record.encrypted_output.fingerprint(),
            "persisting record"
        );

        let ack = match self.store.put(&record).await {
            Ok(ack) => ack,
            Err(e) => {
                if !matches!(e, StoreError::Conflict(_) | StoreError::AlreadyFinalized(_)) {
                    self.mark_failed(&swap_id).await;
                }
                return Err(self.fail(&swap_id, SwapStage::Persisting, Some(&swap_id), e.into()));
            }
        };

        let completed = match self
            .store
            .finalize(&swap_id, SwapStatus::Completed, Some(ack.tx_ref))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                if !matches!(e, StoreError::AlreadyFinalized(_)) {
                    self.mark_failed(&swap_id).await;
                }
                return Err(self.fail(&swap_id, SwapStage::Persisting, Some(&swap_id), e.into()));
            }
        };

        self.emit(&swap_id, SwapStage::Completed, None);
        info!(
            swap_id = %swap_id,
            input = %completed.input_token,
            output = %completed.output_token,
            tx_ref = completed.tx_ref.as_deref().unwrap_or_default(),
            "swap completed"
        );
        Ok(completed)
    }

    fn validate(&self, request: &SwapRequest) -> Result<()> {
        if request.input_amount <= Decimal::ZERO {
            return Err(SwapError::InvalidRequest(
                "input amount must be positive".to_string(),
            ));
        }
        for symbol in [&request.input_token, &request.output_token] {
            if !self.config.supports(symbol) {
                return Err(SwapError::InvalidRequest(format!(
                    "unsupported asset {}",
                    symbol
                )));
            }
        }
        if request.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(SwapError::InvalidRequest(format!(
                "slippage {} bps exceeds {}",
                request.slippage_bps, MAX_SLIPPAGE_BPS
            )));
        }
        Ok(())
    }

    fn emit(&self, swap_id: &str, stage: SwapStage, error: Option<String>) {
        debug!(swap_id = %swap_id, stage = %stage, "swap stage");
        if let Some(cb) = &self.on_progress {
            cb(&SwapProgress {
                swap_id: swap_id.to_string(),
                stage,
                error,
            });
        }
    }

    fn fail(
        &self,
        swap_id: &str,
        stage: SwapStage,
        record_id: Option<&str>,
        error: SwapError,
    ) -> SwapFailure {
        warn!(swap_id = %swap_id, stage = %stage, error = %error, "swap failed");
        self.emit(swap_id, SwapStage::Failed, Some(error.to_string()));
        SwapFailure::new(stage, record_id.map(str::to_string), error)
    }

    /// Best-effort move of a possibly-stored record to `Failed`.
    async fn mark_failed(&self, swap_id: &str) {
        match self.store.finalize(swap_id, SwapStatus::Failed, None).await {
            Ok(_) => debug!(swap_id = %swap_id, "record marked failed"),
            Err(e) => debug!(swap_id = %swap_id, error = %e, "could not mark record failed"),
        }
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// All swap records, most recent first.
    pub async fn history(&self) -> Result<Vec<SwapRecord>> {
        Ok(self.store.list_all().await?)
    }

    pub async fn record(&self, id: &str) -> Result<SwapRecord> {
        Ok(self.store.get(id).await?)
    }

    /// Whether the record store currently answers.
    pub async fn store_available(&self) -> bool {
        self.store.is_available().await
    }

    // -----------------------------------------------------------------------
    // Decryption
    // -----------------------------------------------------------------------

    /// Open one ciphertext of `record`, consuming `capability`.
    ///
    /// The record is never mutated.
    pub async fn request_decryption(
        &self,
        record: &SwapRecord,
        field: CiphertextField,
        capability: &DecryptCapability,
    ) -> Result<Decimal> {
        if let Some(owner) = &record.owner {
            if &capability.subject != owner {
                warn!(swap_id = %record.id, subject = %capability.subject, "decryption by non-owner refused");
                return Err(SwapError::Unauthorized(format!(
                    "{} does not own record {}",
                    capability.subject, record.id
                )));
            }
        }
        self.gate.redeem(capability)?;

        let key = self.keys.encryption_key()?;
        let value = self.codec.decrypt(record.ciphertext(field), &key)?;
        debug!(swap_id = %record.id, field = ?field, subject = %capability.subject, "ciphertext opened");
        Ok(value)
    }

    /// Verify a signed challenge and open one ciphertext in a single step.
    pub async fn decrypt_with_challenge(
        &self,
        record: &SwapRecord,
        field: CiphertextField,
        challenge: &AuthorizationChallenge,
        signature: &[u8],
    ) -> Result<Decimal> {
        let capability = self.gate.verify(challenge, signature)?;
        self.request_decryption(record, field, &capability).await
    }
}

/// `swap_<unix millis>_<9 random chars>`.
fn new_swap_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "swap_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &suffix[..9]
    )
}
