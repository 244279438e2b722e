//! # Device Scenarios
//!
//! End-to-end uplinks through the wired pipeline:
//!
//! 1. Decoding a bare 72-byte uplink
//! 2. Accepting the next nonce and fanning it out to every sink
//! 3. Rejecting a replayed nonce without a second fan-out
//! 4. The bootstrap heartbeat of a brand-new device
//! 5. Rejecting a nonce gap without a response
//! 6. Pruning and syncing against a chain nonce ahead of the ledger

#[cfg(test)]
mod tests {
    use mu_01_wire_codec::decode;
    use mu_03_ledger::{LedgerApi, LedgerError};
    use mu_04_chain_mirror::ChainMirrorApi;
    use mu_06_uplink_processor::{MessageOutcome, UplinkError};
    use mu_07_distribution::Trigger;
    use shared_types::{DeviceIdentifier, TransactionRecord};

    use crate::integration::harness::{Harness, EUI, NOW_MILLIS, TOKEN_ID};

    // =============================================================================
    // DECODE
    // =============================================================================

    #[test]
    fn test_decode_bare_uplink() {
        let h = Harness::new();
        let bytes = h.uplink(0x61, 0x919c_bc1b);
        assert_eq!(bytes.len(), 72);

        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.nonce, 97);
        assert!((decoded.energy - 2_443.000_859).abs() < 1e-9);
        assert_eq!(decoded.signature, hex::encode(&bytes[8..72]));
        assert!(decoded.extensions.is_none());
    }

    // =============================================================================
    // ACCEPT / REPLAY
    // =============================================================================

    #[tokio::test]
    async fn test_next_nonce_is_committed_and_distributed() {
        let h = Harness::new();
        h.seed_device(5);

        let outcome = h.send(&h.uplink(6, 1_000)).await;

        assert!(outcome.is_accepted(), "{:?}", outcome);
        assert_eq!(h.latest_nonce(), 6);
        let stored = h.ledger.get_transaction_by_nonce(6, TOKEN_ID).unwrap().unwrap();
        assert_eq!(stored.received_at, NOW_MILLIS);
        assert_eq!(stored.raw_bytes().unwrap(), h.uplink(6, 1_000));

        let (archive, prover) = h.delivered().await;
        for batches in [&archive, &prover] {
            assert_eq!(batches.len(), 1);
            assert_eq!(
                batches[0].trigger,
                Trigger::Accepted {
                    token_id: TOKEN_ID,
                    nonce: 6
                }
            );
            let current = batches[0].current().unwrap();
            assert_eq!(current.m3ter_id, TOKEN_ID);
            assert_eq!(current.message, stored.raw);
        }

        // Accept path omits the nonce: is_on + lat + lon.
        assert_eq!(outcome.downlink().unwrap().len(), 9);
        assert_eq!(h.downlink.sent()[0].0, EUI);
    }

    #[tokio::test]
    async fn test_replayed_nonce_is_not_recommitted() {
        let h = Harness::new();
        h.seed_device(5);
        assert!(h.send(&h.uplink(6, 1_000)).await.is_accepted());

        let outcome = h.send(&h.uplink(6, 1_000)).await;

        assert!(matches!(
            outcome.error(),
            Some(UplinkError::NonceMismatch {
                expected: 7,
                received: 6
            })
        ));

        // The ledger refuses the same pair on its own as well.
        let replay = TransactionRecord::from_raw(6, TOKEN_ID, NOW_MILLIS, &h.uplink(6, 1_000));
        assert_eq!(
            h.ledger.record_accepted_transaction(&h.key(), &replay),
            Err(LedgerError::DuplicateTransaction {
                nonce: 6,
                identifier: TOKEN_ID
            })
        );

        assert_eq!(h.latest_nonce(), 6);
        assert_eq!(h.stored_nonces(), vec![6]);
        let (archive, prover) = h.delivered().await;
        assert_eq!(archive.len(), 1);
        assert_eq!(prover.len(), 1);
    }

    // =============================================================================
    // HEARTBEATS
    // =============================================================================

    #[tokio::test]
    async fn test_bootstrap_heartbeat_responds_without_commit() {
        let h = Harness::new();
        h.seed_device(0);

        let outcome = h.send(&h.uplink(0, 0)).await;

        let MessageOutcome::Responded {
            downlink,
            accepted_nonce,
        } = &outcome
        else {
            panic!("expected a response, got {:?}", outcome);
        };
        assert!(accepted_nonce.is_none());
        assert_eq!(downlink.len(), 13);
        assert_eq!(downlink[0], 1);
        assert_eq!(&downlink[1..5], &[0, 0, 0, 0]);

        assert!(h.stored_nonces().is_empty());
        assert_eq!(h.latest_nonce(), 0);
        let (archive, prover) = h.delivered().await;
        assert!(archive.is_empty() && prover.is_empty());
        // Bootstrap skips the epoch sync entirely.
        assert_eq!(h.chain.nonce_calls(), 0);
    }

    #[tokio::test]
    async fn test_first_contact_registers_then_bootstraps() {
        let h = Harness::new();

        let outcome = h.send(&h.identifying_uplink(0)).await;

        assert_eq!(outcome.downlink().unwrap().len(), 13);
        let device = h.ledger.get_device_by_dev_eui(EUI).unwrap().unwrap();
        assert_eq!(device.public_key, h.key());
        assert_eq!(device.token_id, TOKEN_ID);
        assert_eq!(device.latest_nonce, 0);

        // Later messages resolve through the transport identifier alone.
        assert!(h.send(&h.uplink(1, 10)).await.is_accepted());
        assert_eq!(h.latest_nonce(), 1);
    }

    #[tokio::test]
    async fn test_identifying_uplink_rederives_drifted_nonce() {
        let h = Harness::new();
        h.seed_device(1);
        h.chain.set_nonce(TOKEN_ID, 3);

        let outcome = h.send(&h.identifying_uplink(4)).await;

        assert!(outcome.is_accepted(), "{:?}", outcome);
        assert_eq!(h.latest_nonce(), 4);
    }

    // =============================================================================
    // REJECTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_nonce_gap_is_rejected_silently() {
        let h = Harness::new();
        h.seed_device(5);

        let outcome = h.send(&h.uplink(9, 1_000)).await;

        assert!(matches!(
            outcome.error(),
            Some(UplinkError::NonceMismatch {
                expected: 6,
                received: 9
            })
        ));
        assert!(h.stored_nonces().is_empty());
        assert_eq!(h.latest_nonce(), 5);
        assert!(h.downlink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_device_without_key_is_rejected() {
        let h = Harness::new();

        let outcome = h.send(&h.uplink(1, 1_000)).await;

        assert!(matches!(outcome.error(), Some(UplinkError::Registrar(_))));
        assert!(h.downlink.sent().is_empty());
        assert!(h.processor.locks().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_signature_is_rejected() {
        let h = Harness::new();
        h.seed_device(5);
        let mut payload = h.uplink(6, 1_000);
        payload[8..72].copy_from_slice(&[0x55; 64]);

        let outcome = h.send(&payload).await;

        assert!(matches!(
            outcome.error(),
            Some(UplinkError::InvalidSignature { .. })
        ));
        assert_eq!(h.latest_nonce(), 5);
        assert!(h.downlink.sent().is_empty());
    }

    // =============================================================================
    // PRUNE AND SYNC
    // =============================================================================

    #[tokio::test]
    async fn test_prune_and_sync_raises_watermark_and_prunes() {
        let h = Harness::new();
        h.seed_device(40);
        h.seed_transactions(36..=40);
        h.seed_transactions(50..=52);
        h.chain.set_nonce(TOKEN_ID, 50);

        let remote = h
            .mirror
            .prune_and_sync_onchain(DeviceIdentifier::TokenId(TOKEN_ID))
            .await
            .unwrap();

        assert_eq!(remote, 50);
        assert_eq!(h.latest_nonce(), 50);
        assert_eq!(h.stored_nonces(), vec![50, 51, 52]);
    }

    #[tokio::test]
    async fn test_epoch_sync_runs_before_nonce_check() {
        let h = Harness::new();
        h.seed_device(100);
        h.seed_transactions(95..=100);
        h.chain.set_nonce(TOKEN_ID, 120);

        // Stale against the local watermark, current against the chain.
        let outcome = h.send(&h.uplink(121, 1_000)).await;

        assert!(outcome.is_accepted(), "{:?}", outcome);
        assert_eq!(h.latest_nonce(), 121);
        assert_eq!(h.stored_nonces(), vec![121]);
    }
}
