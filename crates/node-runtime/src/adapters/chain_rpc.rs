//! # JSON-RPC Chain Reader
//!
//! Implements the mirror's `ChainReader` port with `eth_call` against the
//! configured contracts. Calldata is ABI-encoded by hand: every argument is
//! a single static word, and the only dynamic return value is the verifier
//! name string.
//!
//! | Call                       | Contract        | Function                          |
//! |----------------------------|-----------------|-----------------------------------|
//! | `token_id_for_public_key`  | device registry | `tokenID(bytes32)`                |
//! | `nonce_for_token`          | rollup          | `nonce(uint256)`                  |
//! | `verifier_count`           | revenue reader  | `verifierCount()`                 |
//! | `verifier_at`              | revenue reader  | `verifiers(uint256)`              |
//! | `cross_chain_read`         | revenue reader  | `read(uint256,address,address)`   |
//! | `amount_owed`              | price context   | `owed(uint256)`                   |
//! | `resolve_name`             | ENS registry    | `resolver(bytes32)` then `addr(bytes32)` |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mu_04_chain_mirror::{Address, ChainError, ChainReader, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use shared_types::{PublicKey, TokenId};
use tracing::trace;

use crate::container::config::ChainConfig;

const WORD: usize = 32;

/// Contract addresses the reader calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainContracts {
    /// Key to token id registry.
    pub device_registry: Address,
    /// Confirmed nonces.
    pub rollup: Address,
    /// Verifier registry and revenue reads.
    pub revenue_reader: Address,
    /// Amount owed.
    pub price_context: Address,
    /// Name service registry.
    pub ens_registry: Address,
}

impl ChainContracts {
    /// Parse the configured addresses.
    pub fn from_config(config: &ChainConfig) -> Result<Self, ChainError> {
        Ok(Self {
            device_registry: Address::from_hex(&config.device_registry)?,
            rollup: Address::from_hex(&config.rollup)?,
            revenue_reader: Address::from_hex(&config.revenue_reader)?,
            price_context: Address::from_hex(&config.price_context)?,
            ens_registry: Address::from_hex(&config.ens_registry)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Chain reader over an Ethereum JSON-RPC endpoint.
pub struct JsonRpcChainReader {
    client: Client,
    url: String,
    contracts: ChainContracts,
    request_id: AtomicU64,
}

impl JsonRpcChainReader {
    /// Create a reader. `timeout` bounds every HTTP request.
    pub fn new(
        url: impl Into<String>,
        contracts: ChainContracts,
        timeout: Duration,
    ) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            contracts,
            request_id: AtomicU64::new(1),
        })
    }

    /// Configured contracts.
    pub fn contracts(&self) -> &ChainContracts {
        &self.contracts
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(ChainError::Rpc(format!("{} ({})", error.message, error.code)));
        }
        body.result
            .ok_or_else(|| ChainError::InvalidResponse("missing result".to_string()))
    }

    async fn eth_call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        trace!(to = %to, selector = %hex::encode(&data[..4.min(data.len())]), "eth_call");
        let params = json!([
            { "to": to.to_hex(), "data": format!("0x{}", hex::encode(&data)) },
            "latest"
        ]);
        let result = self.call("eth_call", params).await?;
        let text = result
            .as_str()
            .ok_or_else(|| ChainError::InvalidResponse(format!("eth_call returned {result}")))?;
        hex::decode(text.strip_prefix("0x").unwrap_or(text))
            .map_err(|e| ChainError::InvalidResponse(e.to_string()))
    }

    async fn call_word(&self, to: &Address, data: Vec<u8>) -> Result<U256, ChainError> {
        let output = self.eth_call(to, data).await?;
        word(&output, 0)
    }

    async fn call_address(&self, to: &Address, data: Vec<u8>) -> Result<Address, ChainError> {
        let output = self.eth_call(to, data).await?;
        address_at(&output, 0)
    }
}

#[async_trait]
impl ChainReader for JsonRpcChainReader {
    async fn token_id_for_public_key(&self, public_key: &PublicKey) -> Result<TokenId, ChainError> {
        let data = calldata("tokenID(bytes32)", &[public_key.0]);
        let token_id = self.call_word(&self.contracts.device_registry, data).await?;
        to_u64(token_id, "token id")
    }

    async fn nonce_for_token(&self, token_id: TokenId) -> Result<u64, ChainError> {
        let data = calldata("nonce(uint256)", &[u256_word(U256::from(token_id))]);
        let nonce = self.call_word(&self.contracts.rollup, data).await?;
        to_u64(nonce, "nonce")
    }

    async fn verifier_count(&self) -> Result<u64, ChainError> {
        let data = calldata("verifierCount()", &[]);
        let count = self.call_word(&self.contracts.revenue_reader, data).await?;
        to_u64(count, "verifier count")
    }

    async fn verifier_at(&self, index: u64) -> Result<(String, Address), ChainError> {
        let data = calldata("verifiers(uint256)", &[u256_word(U256::from(index))]);
        let output = self.eth_call(&self.contracts.revenue_reader, data).await?;
        decode_string_address(&output)
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<Address>, ChainError> {
        let node = namehash(name);
        let resolver = self
            .call_address(&self.contracts.ens_registry, calldata("resolver(bytes32)", &[node]))
            .await?;
        if resolver.is_zero() {
            return Ok(None);
        }
        let resolved = self
            .call_address(&resolver, calldata("addr(bytes32)", &[node]))
            .await?;
        Ok((!resolved.is_zero()).then_some(resolved))
    }

    async fn cross_chain_read(
        &self,
        token_id: TokenId,
        target: &Address,
        verifier: &Address,
    ) -> Result<U256, ChainError> {
        let data = calldata(
            "read(uint256,address,address)",
            &[
                u256_word(U256::from(token_id)),
                address_word(target),
                address_word(verifier),
            ],
        );
        self.call_word(&self.contracts.revenue_reader, data).await
    }

    async fn amount_owed(&self, token_id: TokenId) -> Result<U256, ChainError> {
        let data = calldata("owed(uint256)", &[u256_word(U256::from(token_id))]);
        self.call_word(&self.contracts.price_context, data).await
    }
}

// =============================================================================
// ABI helpers
// =============================================================================

fn keccak(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

/// First four bytes of the Keccak-256 hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by static argument words.
pub fn calldata(signature: &str, words: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + words.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for w in words {
        data.extend_from_slice(w);
    }
    data
}

fn u256_word(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&address.0);
    out
}

fn word_slice(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        ChainError::InvalidResponse(format!("return data too short for word {index}"))
    })
}

fn word(data: &[u8], index: usize) -> Result<U256, ChainError> {
    Ok(U256::from_big_endian(word_slice(data, index)?))
}

fn address_at(data: &[u8], index: usize) -> Result<Address, ChainError> {
    let slot = word_slice(data, index)?;
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&slot[12..]);
    Ok(Address(raw))
}

fn to_u64(value: U256, what: &str) -> Result<u64, ChainError> {
    if value > U256::from(u64::MAX) {
        return Err(ChainError::InvalidResponse(format!("{what} {value} exceeds u64")));
    }
    Ok(value.as_u64())
}

fn to_usize(value: U256, what: &str) -> Result<usize, ChainError> {
    usize::try_from(to_u64(value, what)?)
        .map_err(|_| ChainError::InvalidResponse(format!("{what} exceeds usize")))
}

/// `data[start..start + len]`, rejecting ranges that overflow or run past the end.
fn bounded_slice<'a>(
    data: &'a [u8],
    start: usize,
    len: usize,
    what: &str,
) -> Result<&'a [u8], ChainError> {
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| ChainError::InvalidResponse(format!("{what} out of range")))
}

/// Decode a `(string, address)` return tuple.
pub fn decode_string_address(data: &[u8]) -> Result<(String, Address), ChainError> {
    let offset = to_usize(word(data, 0)?, "string offset")?;
    let target = address_at(data, 1)?;

    let length_slot = bounded_slice(data, offset, WORD, "string offset")?;
    let length = to_usize(U256::from_big_endian(length_slot), "string length")?;
    let bytes = bounded_slice(data, offset + WORD, length, "string length")?;
    let name = String::from_utf8(bytes.to_vec())
        .map_err(|e| ChainError::InvalidResponse(e.to_string()))?;
    Ok((name, target))
}

/// ENS name hash.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&keccak(label.as_bytes()));
        node = keccak(&buf);
    }
    node
}
