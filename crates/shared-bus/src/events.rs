//! # Lifecycle Events
//!
//! Events emitted by the uplink pipeline as a message moves through it.
//! Observers and bus subscribers see them in emission order per message.

use serde::{Deserialize, Serialize};
use shared_types::{PublicKey, TokenId};

use crate::observer::CombinePolicy;

/// Why a message was dropped before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// The envelope could not be parsed.
    InvalidEnvelope,
    /// The envelope carried no transport identifier.
    MissingDeviceIdentifier,
    /// Another message from the same device is in flight.
    DeviceBusy,
}

impl DropReason {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::InvalidEnvelope => "invalid_envelope",
            DropReason::MissingDeviceIdentifier => "missing_device_identifier",
            DropReason::DeviceBusy => "device_busy",
        }
    }
}

/// Every event the pipeline can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UplinkEvent {
    // =========================================================================
    // TRANSPORT
    // =========================================================================
    /// A raw message arrived from the transport.
    MessageReceived {
        /// Size of the raw message.
        bytes: usize,
    },

    /// The message was discarded without processing.
    MessageDropped {
        /// Transport identifier, when one was parsed.
        dev_eui: Option<String>,
        /// Why it was dropped.
        reason: DropReason,
    },

    // =========================================================================
    // REGISTRAR (mu-05)
    // =========================================================================
    /// A record was created for a key seen for the first time.
    DeviceRegistered {
        /// Transport identifier.
        dev_eui: String,
        /// Token id assigned by the chain.
        token_id: TokenId,
        /// The device key.
        public_key: PublicKey,
        /// True when an older key held the token.
        rotated: bool,
    },

    // =========================================================================
    // CHAIN MIRROR (mu-04)
    // =========================================================================
    /// The watermark hit a sync epoch boundary and was reconciled.
    SyncEpochReached {
        /// Device token id.
        token_id: TokenId,
        /// Nonce reported by the chain.
        remote_nonce: u64,
    },

    // =========================================================================
    // LEDGER (mu-03)
    // =========================================================================
    /// A transaction was committed and the watermark advanced.
    TransactionAccepted {
        /// Device token id.
        token_id: TokenId,
        /// Accepted nonce.
        nonce: u64,
    },

    // =========================================================================
    // PROCESSOR (mu-06)
    // =========================================================================
    /// The on/off state for the response was computed.
    StateComputed {
        /// Device token id.
        token_id: TokenId,
        /// Computed state.
        is_on: bool,
    },

    /// A response was handed to the downlink queue.
    DownlinkEnqueued {
        /// Transport identifier.
        dev_eui: String,
        /// Encoded response length.
        bytes: usize,
    },

    /// Processing failed; the message produced no response.
    MessageFailed {
        /// Transport identifier.
        dev_eui: String,
        /// Rendered error.
        error: String,
    },

    /// The per-device lock was released.
    DeviceUnlocked {
        /// Transport identifier.
        dev_eui: String,
    },

    /// The message left the pipeline, on any path.
    ProcessingComplete,
}

/// Coarse grouping used for subscription filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Inbound and outbound transport activity.
    Transport,
    /// Device record changes.
    Registry,
    /// Chain reconciliation.
    Chain,
    /// Ledger commits.
    Ledger,
    /// Response state.
    State,
    /// Wildcard.
    All,
}

impl UplinkEvent {
    /// Topic of this event.
    pub fn topic(&self) -> EventTopic {
        match self {
            UplinkEvent::MessageReceived { .. }
            | UplinkEvent::MessageDropped { .. }
            | UplinkEvent::DownlinkEnqueued { .. }
            | UplinkEvent::MessageFailed { .. }
            | UplinkEvent::DeviceUnlocked { .. }
            | UplinkEvent::ProcessingComplete => EventTopic::Transport,
            UplinkEvent::DeviceRegistered { .. } => EventTopic::Registry,
            UplinkEvent::SyncEpochReached { .. } => EventTopic::Chain,
            UplinkEvent::TransactionAccepted { .. } => EventTopic::Ledger,
            UplinkEvent::StateComputed { .. } => EventTopic::State,
        }
    }

    /// Subsystem number that emits the event.
    pub fn source_subsystem(&self) -> u8 {
        match self.topic() {
            EventTopic::Registry => 5,
            EventTopic::Chain => 4,
            EventTopic::Ledger => 3,
            _ => 6,
        }
    }

    /// How observer results for this event are combined.
    ///
    /// Notifications carry no return value, so every observer runs and
    /// failures are logged.
    pub fn policy(&self) -> CombinePolicy {
        CombinePolicy::CollectIgnore
    }
}

/// Filter for bus subscriptions.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to receive. Empty means all.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Receive every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Receive only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &UplinkEvent) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic_mapping() {
        let event = UplinkEvent::TransactionAccepted {
            token_id: 1,
            nonce: 2,
        };
        assert_eq!(event.topic(), EventTopic::Ledger);
        assert_eq!(event.source_subsystem(), 3);
        assert_eq!(UplinkEvent::ProcessingComplete.source_subsystem(), 6);
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Chain]);
        assert!(filter.matches(&UplinkEvent::SyncEpochReached {
            token_id: 1,
            remote_nonce: 100
        }));
        assert!(!filter.matches(&UplinkEvent::ProcessingComplete));
        assert!(EventFilter::all().matches(&UplinkEvent::ProcessingComplete));
    }

    #[test]
    fn test_drop_reason_labels() {
        assert_eq!(DropReason::DeviceBusy.as_str(), "device_busy");
        assert_eq!(
            DropReason::MissingDeviceIdentifier.as_str(),
            "missing_device_identifier"
        );
    }

    #[test]
    fn test_notifications_collect_and_ignore() {
        assert_eq!(
            UplinkEvent::DeviceUnlocked {
                dev_eui: "a".into()
            }
            .policy(),
            CombinePolicy::CollectIgnore
        );
    }
}
