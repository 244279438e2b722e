//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;
use primitive_types::U256;
use shared_types::{DeviceIdentifier, PublicKey, TokenId};

use crate::domain::errors::ChainMirrorError;

/// Chain reconciliation API used by the registrar, the processor and the
/// scheduled jobs.
#[async_trait]
pub trait ChainMirrorApi: Send + Sync {
    /// Raise the local watermark to the on-chain nonce and prune every
    /// transaction below it. Returns the on-chain nonce.
    async fn prune_and_sync_onchain(
        &self,
        identifier: DeviceIdentifier,
    ) -> Result<u64, ChainMirrorError>;

    /// On-chain nonce advanced through contiguous local transactions; local
    /// transactions beyond the result are pruned.
    async fn get_latest_transaction_nonce(&self, token_id: TokenId)
        -> Result<u64, ChainMirrorError>;

    /// Token id registered on chain for a key.
    async fn token_id_for_public_key(
        &self,
        public_key: &PublicKey,
    ) -> Result<TokenId, ChainMirrorError>;

    /// Rebuild the verifier cache. Returns the number of verifiers.
    async fn initialize_verifiers(&self) -> Result<usize, ChainMirrorError>;

    /// True once the verifier cache holds a complete list.
    fn is_verifiers_cache_initialized(&self) -> bool;

    /// Cached verifier count; zero when uninitialized.
    fn cached_verifiers_count(&self) -> usize;

    /// Revenue summed over every reachable verifier.
    async fn get_cross_chain_revenue(&self, token_id: TokenId) -> Result<U256, ChainMirrorError>;

    /// Amount currently owed by the token.
    async fn get_amount_owed(&self, token_id: TokenId) -> Result<U256, ChainMirrorError>;
}
