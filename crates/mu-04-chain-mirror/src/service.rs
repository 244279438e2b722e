//! # Chain Mirror Service
//!
//! Keeps the local nonce watermark consistent with the chain and prunes
//! superseded transaction history. Every chain read goes through the retry
//! policy; exhaustion surfaces as `RemoteCallFailure`.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use mu_03_ledger::LedgerApi;
use primitive_types::U256;
use shared_types::{retry_with_backoff, DeviceIdentifier, PublicKey, RetryPolicy, TokenId};
use tracing::{debug, info, warn};
use uplink_telemetry::{CHAIN_SYNCS, REMOTE_CALL_FAILURES};

use crate::domain::errors::{ChainError, ChainMirrorError};
use crate::ports::inbound::ChainMirrorApi;
use crate::ports::outbound::ChainReader;
use crate::verifier_cache::VerifierCache;

/// The chain mirror.
pub struct ChainMirror {
    ledger: Arc<dyn LedgerApi>,
    chain: Arc<dyn ChainReader>,
    verifiers: VerifierCache,
    policy: RetryPolicy,
}

impl ChainMirror {
    /// Create a mirror over a ledger and a chain reader.
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        chain: Arc<dyn ChainReader>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            chain,
            verifiers: VerifierCache::new(),
            policy,
        }
    }

    /// Retry policy applied to chain reads.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn remote<T, F, Fut>(&self, call: &'static str, op: F) -> Result<T, ChainMirrorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        retry_with_backoff(&self.policy, call, op).await.map_err(|e| {
            REMOTE_CALL_FAILURES.with_label_values(&[call]).inc();
            ChainMirrorError::RemoteCallFailure {
                call,
                reason: e.to_string(),
            }
        })
    }

    async fn remote_nonce(&self, token_id: TokenId) -> Result<u64, ChainMirrorError> {
        let chain = self.chain.as_ref();
        self.remote("nonce_for_token", move || chain.nonce_for_token(token_id))
            .await
    }

    async fn sync(&self, identifier: DeviceIdentifier) -> Result<u64, ChainMirrorError> {
        let device = match identifier {
            DeviceIdentifier::TokenId(token_id) => self.ledger.get_device_by_token_id(token_id)?,
            DeviceIdentifier::PublicKey(key) => self.ledger.get_device_by_public_key(&key)?,
        }
        .ok_or(ChainMirrorError::DeviceNotFound(identifier))?;

        let remote_nonce = self.remote_nonce(device.token_id).await?;

        // Raise-only: the pipeline may have committed past `device` meanwhile.
        if self
            .ledger
            .raise_device_nonce(&device.public_key, remote_nonce)?
        {
            info!(
                token_id = device.token_id,
                local = device.latest_nonce,
                remote = remote_nonce,
                "[mu-04] Local watermark raised to on-chain nonce"
            );
        }

        let pruned = self
            .ledger
            .prune_transactions_before(device.token_id, remote_nonce)?;
        debug!(
            token_id = device.token_id,
            remote_nonce, pruned, "[mu-04] Prune and sync complete"
        );
        Ok(remote_nonce)
    }
}

#[async_trait]
impl ChainMirrorApi for ChainMirror {
    async fn prune_and_sync_onchain(
        &self,
        identifier: DeviceIdentifier,
    ) -> Result<u64, ChainMirrorError> {
        let result = self.sync(identifier).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        CHAIN_SYNCS.with_label_values(&[outcome]).inc();
        result
    }

    async fn get_latest_transaction_nonce(
        &self,
        token_id: TokenId,
    ) -> Result<u64, ChainMirrorError> {
        let mut cursor = self.remote_nonce(token_id).await?;

        while self
            .ledger
            .get_transaction_by_nonce(cursor + 1, token_id)?
            .is_some()
        {
            cursor += 1;
        }

        let orphaned = self.ledger.prune_transactions_after(token_id, cursor)?;
        if orphaned > 0 {
            warn!(token_id, cursor, orphaned, "[mu-04] Dropped transactions beyond canonical nonce");
        }
        Ok(cursor)
    }

    async fn token_id_for_public_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<TokenId, ChainMirrorError> {
        let chain = self.chain.as_ref();
        self.remote("token_id_for_public_key", move || {
            chain.token_id_for_public_key(public_key)
        })
        .await
    }

    async fn initialize_verifiers(&self) -> Result<usize, ChainMirrorError> {
        let entries = self
            .verifiers
            .initialize(self.chain.as_ref(), &self.policy)
            .await?;
        Ok(entries.len())
    }

    fn is_verifiers_cache_initialized(&self) -> bool {
        self.verifiers.is_initialized()
    }

    fn cached_verifiers_count(&self) -> usize {
        self.verifiers.count()
    }

    async fn get_cross_chain_revenue(&self, token_id: TokenId) -> Result<U256, ChainMirrorError> {
        let verifiers = self
            .verifiers
            .get_or_init(self.chain.as_ref(), &self.policy)
            .await?;
        let chain = self.chain.as_ref();

        let mut total = U256::zero();
        for verifier in verifiers.iter() {
            let target = &verifier.target_address;
            let address = &verifier.verifier_address;
            match self
                .remote("cross_chain_read", move || {
                    chain.cross_chain_read(token_id, target, address)
                })
                .await
            {
                Ok(amount) => total = total.saturating_add(amount),
                Err(e) => warn!(
                    token_id,
                    verifier = %verifier.ens_name,
                    error = %e,
                    "[mu-04] Skipping verifier revenue"
                ),
            }
        }
        Ok(total)
    }

    async fn get_amount_owed(&self, token_id: TokenId) -> Result<U256, ChainMirrorError> {
        let chain = self.chain.as_ref();
        self.remote("amount_owed", move || chain.amount_owed(token_id))
            .await
    }
}
