//! # Verifier Cache
//!
//! Process-wide list of revenue verifiers, built once from the on-chain
//! registry. Initialization is all-or-nothing: if any entry cannot be read or
//! resolved, the cache stays empty and uninitialized.

use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{retry_with_backoff, RetryPolicy};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::domain::errors::ChainMirrorError;
use crate::domain::verifier::VerifierInfo;
use crate::ports::outbound::ChainReader;

/// Upper bound on registry entries accepted from the chain.
pub const MAX_VERIFIERS: u64 = 256;

/// Read-mostly verifier cache.
#[derive(Default)]
pub struct VerifierCache {
    entries: RwLock<Option<Arc<Vec<VerifierInfo>>>>,
    init_lock: Mutex<()>,
}

impl VerifierCache {
    /// Empty, uninitialized cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a complete initialization has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.entries.read().is_some()
    }

    /// Number of cached verifiers; zero when uninitialized.
    pub fn count(&self) -> usize {
        self.entries.read().as_ref().map_or(0, |v| v.len())
    }

    /// Current entries, if initialized.
    pub fn snapshot(&self) -> Option<Arc<Vec<VerifierInfo>>> {
        self.entries.read().clone()
    }

    /// Rebuild the cache from the registry, replacing any previous contents.
    pub async fn initialize(
        &self,
        chain: &dyn ChainReader,
        policy: &RetryPolicy,
    ) -> Result<Arc<Vec<VerifierInfo>>, ChainMirrorError> {
        let _guard = self.init_lock.lock().await;
        self.rebuild(chain, policy).await
    }

    /// Cached entries, initializing on first use.
    pub async fn get_or_init(
        &self,
        chain: &dyn ChainReader,
        policy: &RetryPolicy,
    ) -> Result<Arc<Vec<VerifierInfo>>, ChainMirrorError> {
        if let Some(entries) = self.snapshot() {
            return Ok(entries);
        }
        let _guard = self.init_lock.lock().await;
        if let Some(entries) = self.snapshot() {
            return Ok(entries);
        }
        self.rebuild(chain, policy).await
    }

    async fn rebuild(
        &self,
        chain: &dyn ChainReader,
        policy: &RetryPolicy,
    ) -> Result<Arc<Vec<VerifierInfo>>, ChainMirrorError> {
        match fetch_all(chain, policy).await {
            Ok(list) => {
                let entries = Arc::new(list);
                *self.entries.write() = Some(Arc::clone(&entries));
                info!(count = entries.len(), "[mu-04] Verifier cache initialized");
                Ok(entries)
            }
            Err(e) => {
                *self.entries.write() = None;
                error!(error = %e, "[mu-04] Verifier cache initialization failed");
                Err(e)
            }
        }
    }
}

fn remote_failure(call: &'static str, reason: impl ToString) -> ChainMirrorError {
    ChainMirrorError::RemoteCallFailure {
        call,
        reason: reason.to_string(),
    }
}

async fn fetch_all(
    chain: &dyn ChainReader,
    policy: &RetryPolicy,
) -> Result<Vec<VerifierInfo>, ChainMirrorError> {
    let count = retry_with_backoff(policy, "verifier_count", move || chain.verifier_count())
        .await
        .map_err(|e| remote_failure("verifier_count", e))?;

    if count > MAX_VERIFIERS {
        return Err(remote_failure(
            "verifier_count",
            format!("registry reports {count} entries, limit is {MAX_VERIFIERS}"),
        ));
    }

    let mut verifiers = Vec::new();
    for index in 0..count {
        let (ens_name, target_address) =
            retry_with_backoff(policy, "verifier_at", move || chain.verifier_at(index))
                .await
                .map_err(|e| remote_failure("verifier_at", e))?;

        let name = ens_name.as_str();
        let resolved = retry_with_backoff(policy, "resolve_name", move || chain.resolve_name(name))
            .await
            .map_err(|e| remote_failure("resolve_name", e))?;

        let verifier_address = match resolved {
            Some(addr) if !addr.is_zero() => addr,
            _ => return Err(ChainMirrorError::UnresolvedVerifier { name: ens_name }),
        };

        verifiers.push(VerifierInfo {
            ens_name,
            target_address,
            verifier_address,
        });
    }
    Ok(verifiers)
}
