//! # Outbound Ports
//!
//! Read-only chain calls the mirror depends on.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use primitive_types::U256;
use shared_types::{PublicKey, TokenId};

use crate::domain::errors::ChainError;
use crate::domain::verifier::Address;

/// Read-only view of the device registry, the verifier registry and the
/// revenue contracts.
///
/// Production: `JsonRpcChainReader` (node-runtime/adapters/chain_rpc.rs)
/// Testing: `MockChainReader` (below)
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Token id registered for a device key.
    async fn token_id_for_public_key(&self, public_key: &PublicKey) -> Result<TokenId, ChainError>;

    /// Latest nonce confirmed on chain for a token.
    async fn nonce_for_token(&self, token_id: TokenId) -> Result<u64, ChainError>;

    /// Number of registered verifiers.
    async fn verifier_count(&self) -> Result<u64, ChainError>;

    /// Registry entry `index`: `(name, target_address)`.
    async fn verifier_at(&self, index: u64) -> Result<(String, Address), ChainError>;

    /// Resolve a verifier name. `None` when the name has no address.
    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, ChainError>;

    /// Revenue recorded for a token by one verifier.
    async fn cross_chain_read(
        &self,
        token_id: TokenId,
        target: &Address,
        verifier: &Address,
    ) -> Result<U256, ChainError>;

    /// Amount the token currently owes.
    async fn amount_owed(&self, token_id: TokenId) -> Result<U256, ChainError>;
}

/// Configurable in-memory chain for tests.
#[derive(Default)]
pub struct MockChainReader {
    token_ids: RwLock<HashMap<PublicKey, TokenId>>,
    nonces: RwLock<HashMap<TokenId, u64>>,
    verifiers: RwLock<Vec<(String, Address)>>,
    names: RwLock<HashMap<String, Option<Address>>>,
    revenue: RwLock<HashMap<(TokenId, Address), U256>>,
    failing_verifiers: RwLock<HashSet<Address>>,
    owed: RwLock<HashMap<TokenId, U256>>,
    should_fail: RwLock<bool>,
    nonce_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockChainReader {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device key under a token id.
    pub fn set_token_id(&self, public_key: PublicKey, token_id: TokenId) {
        self.token_ids.write().insert(public_key, token_id);
    }

    /// Set the on-chain nonce of a token.
    pub fn set_nonce(&self, token_id: TokenId, nonce: u64) {
        self.nonces.write().insert(token_id, nonce);
    }

    /// Append a verifier; `resolved` is what its name resolves to.
    pub fn add_verifier(&self, name: &str, target: Address, resolved: Option<Address>) {
        self.verifiers.write().push((name.to_string(), target));
        self.names.write().insert(name.to_string(), resolved);
    }

    /// Revenue a verifier reports for a token.
    pub fn set_revenue(&self, token_id: TokenId, verifier: Address, amount: U256) {
        self.revenue.write().insert((token_id, verifier), amount);
    }

    /// Make reads through one verifier fail.
    pub fn fail_verifier(&self, verifier: Address) {
        self.failing_verifiers.write().insert(verifier);
    }

    /// Amount owed by a token.
    pub fn set_owed(&self, token_id: TokenId, amount: U256) {
        self.owed.write().insert(token_id, amount);
    }

    /// Make every call fail.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write() = fail;
    }

    /// Number of `nonce_for_token` calls served.
    pub fn nonce_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
    }

    /// Number of `resolve_name` calls served.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ChainError> {
        if *self.should_fail.read() {
            return Err(ChainError::Rpc("Mock failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn token_id_for_public_key(&self, public_key: &PublicKey) -> Result<TokenId, ChainError> {
        self.check()?;
        self.token_ids
            .read()
            .get(public_key)
            .copied()
            .ok_or_else(|| ChainError::NotRegistered(public_key.to_hex()))
    }

    async fn nonce_for_token(&self, token_id: TokenId) -> Result<u64, ChainError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.nonces.read().get(&token_id).copied().unwrap_or(0))
    }

    async fn verifier_count(&self) -> Result<u64, ChainError> {
        self.check()?;
        Ok(self.verifiers.read().len() as u64)
    }

    async fn verifier_at(&self, index: u64) -> Result<(String, Address), ChainError> {
        self.check()?;
        self.verifiers
            .read()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ChainError::InvalidResponse(format!("no verifier at {}", index)))
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, ChainError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.names.read().get(name).copied().flatten())
    }

    async fn cross_chain_read(
        &self,
        token_id: TokenId,
        _target: &Address,
        verifier: &Address,
    ) -> Result<U256, ChainError> {
        self.check()?;
        if self.failing_verifiers.read().contains(verifier) {
            return Err(ChainError::Rpc(format!("verifier {} unreachable", verifier)));
        }
        Ok(self
            .revenue
            .read()
            .get(&(token_id, *verifier))
            .copied()
            .unwrap_or_default())
    }

    async fn amount_owed(&self, token_id: TokenId) -> Result<U256, ChainError> {
        self.check()?;
        Ok(self.owed.read().get(&token_id).copied().unwrap_or_default())
    }
}
