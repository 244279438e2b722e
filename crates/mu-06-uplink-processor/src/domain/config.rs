//! Processor settings.

use serde::{Deserialize, Serialize};

/// Default watermark interval between chain reconciliations.
pub const DEFAULT_SYNC_EPOCH: u64 = 100;

/// Pipeline knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Reconcile with the chain whenever `latest_nonce % sync_epoch == 0`.
    pub sync_epoch: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sync_epoch: DEFAULT_SYNC_EPOCH,
        }
    }
}

impl ProcessorConfig {
    /// True when the watermark sits on an epoch boundary.
    pub fn is_sync_point(&self, latest_nonce: u64) -> bool {
        self.sync_epoch != 0 && latest_nonce % self.sync_epoch == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_points() {
        let config = ProcessorConfig::default();
        assert!(config.is_sync_point(0));
        assert!(config.is_sync_point(200));
        assert!(!config.is_sync_point(199));
        assert!(!ProcessorConfig { sync_epoch: 0 }.is_sync_point(0));
    }
}
