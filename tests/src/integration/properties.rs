//! # Pipeline Invariants
//!
//! - Duplicate `(nonce, identifier)` pairs never move the watermark
//! - Accepted nonces advance the watermark by exactly one
//! - One in-flight message per transport identifier
//! - Decoding is deterministic
//! - Prune-and-sync keeps exactly the records at or above the chain nonce
//! - A verifier cache never holds a partial list

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    use mu_01_wire_codec::decode;
    use mu_03_ledger::{LedgerApi, LedgerError};
    use mu_04_chain_mirror::{Address, ChainMirrorApi, U256};
    use mu_06_uplink_processor::{MessageOutcome, UplinkProcessorApi};
    use proptest::prelude::*;
    use shared_bus::DropReason;
    use shared_types::{DeviceIdentifier, TransactionRecord};
    use tokio::time::timeout;

    use crate::integration::harness::{Harness, EUI, NOW_MILLIS, TOKEN_ID};

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    // =============================================================================
    // LEDGER IDEMPOTENCY
    // =============================================================================

    #[test]
    fn test_duplicate_pairs_leave_watermark_alone() {
        let h = Harness::new();
        h.seed_device(0);
        for nonce in 1..=3 {
            let record = TransactionRecord::from_raw(nonce, TOKEN_ID, NOW_MILLIS, &[nonce as u8]);
            h.ledger.record_accepted_transaction(&h.key(), &record).unwrap();
        }

        for nonce in 1..=3 {
            let replay = TransactionRecord::from_raw(nonce, TOKEN_ID, NOW_MILLIS + 1, &[0xFF]);
            assert_eq!(
                h.ledger.record_accepted_transaction(&h.key(), &replay),
                Err(LedgerError::DuplicateTransaction {
                    nonce,
                    identifier: TOKEN_ID
                })
            );
            assert!(matches!(
                h.ledger.insert_transaction(&replay),
                Err(LedgerError::DuplicateTransaction { .. })
            ));
        }

        assert_eq!(h.latest_nonce(), 3);
        let first = h.ledger.get_transaction_by_nonce(1, TOKEN_ID).unwrap().unwrap();
        assert_eq!(first.raw, "01");
    }

    // =============================================================================
    // NONCE MONOTONICITY
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_watermark_advances_by_one(nonces in proptest::collection::vec(0u32..8, 1..16)) {
            let h = Harness::new();
            h.seed_device(1);

            let accepted = block_on(async {
                let mut accepted = Vec::new();
                for nonce in nonces {
                    let before = h.latest_nonce();
                    let outcome = h.send(&h.uplink(nonce, 1_000)).await;
                    let after = h.latest_nonce();
                    assert!(after >= before);
                    match outcome {
                        MessageOutcome::Responded { accepted_nonce: Some(n), .. } => {
                            assert_eq!(n, before + 1);
                            assert_eq!(after, n);
                            accepted.push(n);
                        }
                        _ => assert_eq!(after, before),
                    }
                }
                accepted
            });

            prop_assert_eq!(h.stored_nonces(), accepted.clone());
            let expected: Vec<u64> = (2..2 + accepted.len() as u64).collect();
            prop_assert_eq!(accepted, expected);
        }
    }

    // =============================================================================
    // PER-DEVICE EXCLUSION
    // =============================================================================

    #[tokio::test]
    async fn test_second_message_dropped_while_first_in_flight() {
        let h = Harness::new();
        h.seed_device(5);
        h.downlink.hold();

        let processor = Arc::clone(&h.processor);
        let first = h.message(&h.uplink(6, 1_000));
        let in_flight = tokio::spawn(async move { processor.handle_message(&first).await });
        timeout(Duration::from_secs(5), h.downlink.entered())
            .await
            .expect("first message never reached the downlink");
        assert!(h.processor.locks().is_locked(EUI));

        let second = h.send(&h.uplink(6, 1_000)).await;
        assert!(matches!(
            second,
            MessageOutcome::Dropped(DropReason::DeviceBusy)
        ));

        h.downlink.open();
        let first = in_flight.await.unwrap();
        assert!(first.is_accepted(), "{:?}", first);
        assert!(h.processor.locks().is_empty());

        // The lock is free again once the first message is done.
        assert!(h.send(&h.uplink(7, 1_000)).await.is_accepted());
        assert_eq!(h.stored_nonces(), vec![6, 7]);
    }

    #[tokio::test]
    async fn test_failed_message_releases_lock() {
        let h = Harness::new();
        h.seed_device(100);
        h.chain.set_should_fail(true);

        // Epoch sync fails against the chain.
        assert!(h.send(&h.uplink(101, 1_000)).await.error().is_some());
        assert!(h.processor.locks().is_empty());

        h.chain.set_should_fail(false);
        h.chain.set_nonce(TOKEN_ID, 100);
        assert!(h.send(&h.uplink(101, 1_000)).await.is_accepted());
    }

    // =============================================================================
    // DECODE DETERMINISM
    // =============================================================================

    proptest! {
        #[test]
        fn prop_decode_same_bytes_same_payload(bytes in proptest::collection::vec(any::<u8>(), 72..160)) {
            prop_assert_eq!(decode(&bytes).unwrap(), decode(&bytes).unwrap());
        }
    }

    // =============================================================================
    // PRUNING
    // =============================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_prune_keeps_records_at_or_above_remote(
            local in proptest::collection::btree_set(1u64..120, 0..24),
            watermark in 0u64..120,
            remote in 0u64..120,
        ) {
            let h = Harness::new();
            h.seed_device(watermark);
            h.seed_transactions(local.iter().copied());
            h.chain.set_nonce(TOKEN_ID, remote);

            let synced = block_on(
                h.mirror.prune_and_sync_onchain(DeviceIdentifier::TokenId(TOKEN_ID)),
            )
            .unwrap();

            prop_assert_eq!(synced, remote);
            prop_assert_eq!(h.latest_nonce(), watermark.max(remote));
            let kept: BTreeSet<u64> = h.stored_nonces().into_iter().collect();
            let expected: BTreeSet<u64> = local.range(remote..).copied().collect();
            prop_assert_eq!(kept, expected);
        }
    }

    // =============================================================================
    // VERIFIER CACHE
    // =============================================================================

    #[tokio::test]
    async fn test_unresolved_verifier_leaves_cache_empty() {
        let h = Harness::new();
        h.chain
            .add_verifier("base.eth", Address([1; 20]), Some(Address([0xB1; 20])));
        assert_eq!(h.mirror.initialize_verifiers().await.unwrap(), 1);
        assert!(h.mirror.is_verifiers_cache_initialized());

        h.chain.add_verifier("gone.eth", Address([2; 20]), None);
        assert!(h.mirror.initialize_verifiers().await.is_err());

        assert!(!h.mirror.is_verifiers_cache_initialized());
        assert_eq!(h.mirror.cached_verifiers_count(), 0);
    }

    #[tokio::test]
    async fn test_revenue_from_cached_verifiers_gates_state() {
        let h = Harness::new();
        h.seed_device(5);
        let verifier = Address([0xB1; 20]);
        h.chain.add_verifier("base.eth", Address([1; 20]), Some(verifier));
        h.chain.set_owed(TOKEN_ID, U256::from(100));
        h.chain.set_revenue(TOKEN_ID, verifier, U256::from(99));

        let outcome = h.send(&h.uplink(6, 1_000)).await;
        assert_eq!(outcome.downlink().unwrap()[0], 0);

        h.chain.set_revenue(TOKEN_ID, verifier, U256::from(100));
        let outcome = h.send(&h.uplink(7, 1_000)).await;
        assert_eq!(outcome.downlink().unwrap()[0], 1);
        assert_eq!(h.mirror.cached_verifiers_count(), 1);
    }
}
