//! Relay sink: publishes the batch to each configured stream.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::{check_status, http_client, join_segments};
use crate::domain::batch::DistributionBatch;
use crate::domain::errors::SinkError;
use crate::ports::outbound::DistributionSink;

/// HTTP pub/sub relay.
///
/// Each stream receives the whole batch at
/// `{base_url}/streams/{stream_id}/publish`.
pub struct RelaySink {
    client: reqwest::Client,
    base_url: String,
    stream_ids: Vec<String>,
}

impl RelaySink {
    /// Sink publishing to `stream_ids` through `base_url`.
    pub fn new(base_url: impl Into<String>, stream_ids: Vec<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into(),
            stream_ids,
        }
    }

    /// Publish URL for one stream.
    pub fn stream_url(&self, stream_id: &str) -> Result<reqwest::Url, SinkError> {
        join_segments(&self.base_url, &["streams", stream_id, "publish"])
    }
}

#[async_trait]
impl DistributionSink for RelaySink {
    fn name(&self) -> &str {
        "relay"
    }

    async fn deliver(&self, batch: &DistributionBatch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        for stream_id in &self.stream_ids {
            let response = self
                .client
                .post(self.stream_url(stream_id)?)
                .json(&batch.payloads)
                .send()
                .await?;
            check_status(response)?;
            debug!(stream_id = %stream_id, count = batch.len(), "[mu-07] Published to stream");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        let sink = RelaySink::new(
            "http://relay.local",
            vec!["0xabc/m3tering/test".into()],
            Duration::from_secs(5),
        );
        assert_eq!(
            sink.stream_url("0xabc/m3tering/test").unwrap().as_str(),
            "http://relay.local/streams/0xabc%2Fm3tering%2Ftest/publish"
        );
    }
}
