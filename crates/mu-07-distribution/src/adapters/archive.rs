//! Archive sink: uploads the committed payload with descriptive tags.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shared_types::TimeSource;
use tracing::{debug, trace};

use crate::adapters::{check_status, http_client};
use crate::domain::batch::DistributionBatch;
use crate::domain::errors::SinkError;
use crate::domain::tags::{archive_tags, Tag};
use crate::ports::outbound::DistributionSink;

/// Request body accepted by the archive gateway.
#[derive(Debug, Serialize)]
pub struct ArchiveUpload<'a> {
    /// Payload hex.
    pub data: &'a str,
    /// Metadata tags.
    pub tags: Vec<Tag>,
}

/// Durable archival storage behind an upload gateway.
///
/// Archival is per transaction: only the payload that triggered the round
/// is uploaded, scheduled rounds are skipped.
pub struct ArchiveSink {
    client: reqwest::Client,
    upload_url: String,
    contract_label: String,
    clock: Arc<dyn TimeSource>,
}

impl ArchiveSink {
    /// Sink uploading to `upload_url`.
    pub fn new(
        upload_url: impl Into<String>,
        contract_label: impl Into<String>,
        clock: Arc<dyn TimeSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            upload_url: upload_url.into(),
            contract_label: contract_label.into(),
            clock,
        }
    }
}

#[async_trait]
impl DistributionSink for ArchiveSink {
    fn name(&self) -> &str {
        "archive"
    }

    async fn deliver(&self, batch: &DistributionBatch) -> Result<(), SinkError> {
        let Some(current) = batch.current() else {
            trace!("[mu-07] No committed payload in batch, nothing to archive");
            return Ok(());
        };

        let upload = ArchiveUpload {
            data: &current.message,
            tags: archive_tags(current, &self.contract_label, self.clock.now_millis())?,
        };
        let response = self
            .client
            .post(&self.upload_url)
            .json(&upload)
            .send()
            .await?;
        check_status(response)?;
        debug!(m3ter_id = current.m3ter_id, "[mu-07] Payload archived");
        Ok(())
    }
}
