//! # Inbound Ports (Driving Ports / API)

use async_trait::async_trait;

use crate::domain::outcome::MessageOutcome;

/// Entry point for the transport adapter.
#[async_trait]
pub trait UplinkProcessorApi: Send + Sync {
    /// Run the full pipeline for one raw transport message.
    ///
    /// Never panics and never returns an error: every failure is logged,
    /// counted and reported in the outcome.
    async fn handle_message(&self, raw: &[u8]) -> MessageOutcome;
}
