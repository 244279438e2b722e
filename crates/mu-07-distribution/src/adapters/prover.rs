//! Prover sink: posts the batch as a JSON array to `{url}/batch-payloads`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::{check_status, http_client, join_segments};
use crate::domain::batch::DistributionBatch;
use crate::domain::errors::SinkError;
use crate::ports::outbound::DistributionSink;

/// HTTP prover endpoint.
pub struct ProverSink {
    client: reqwest::Client,
    base_url: String,
}

impl ProverSink {
    /// Sink posting to `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into(),
        }
    }

    /// Full endpoint URL.
    pub fn endpoint(&self) -> Result<reqwest::Url, SinkError> {
        join_segments(&self.base_url, &["batch-payloads"])
    }
}

#[async_trait]
impl DistributionSink for ProverSink {
    fn name(&self) -> &str {
        "prover"
    }

    async fn deliver(&self, batch: &DistributionBatch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(self.endpoint()?)
            .json(&batch.payloads)
            .send()
            .await?;
        let response = check_status(response)?;
        debug!(
            count = batch.len(),
            status = response.status().as_u16(),
            "[mu-07] Prover accepted batch"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let sink = ProverSink::new("https://prover.example", Duration::from_secs(5));
        assert_eq!(
            sink.endpoint().unwrap().as_str(),
            "https://prover.example/batch-payloads"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let sink = ProverSink::new("http://127.0.0.1:9", Duration::from_millis(10));
        assert!(sink.deliver(&DistributionBatch::scheduled(&[])).await.is_ok());
    }
}
