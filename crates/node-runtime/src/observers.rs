//! # Lifecycle Observers
//!
//! Observers the node registers on the lifecycle bus at startup.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use shared_bus::{LifecycleObserver, ObserverError, UplinkEvent};
use tracing::debug;

/// Logs every lifecycle event at debug level. Abstains from all queries.
#[derive(Debug, Default)]
pub struct EventLogObserver {
    logged: AtomicU64,
}

impl EventLogObserver {
    /// Observer with nothing logged yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged so far.
    pub fn logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LifecycleObserver for EventLogObserver {
    fn name(&self) -> &str {
        "event-log"
    }

    async fn on_event(&self, event: &UplinkEvent) -> Result<(), ObserverError> {
        self.logged.fetch_add(1, Ordering::Relaxed);
        debug!(
            topic = ?event.topic(),
            source = event.source_subsystem(),
            event = ?event,
            "[node] Lifecycle event"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::{LifecycleBus, LifecycleQuery};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_logs_events_and_abstains_from_queries() {
        let bus = LifecycleBus::new();
        let observer = Arc::new(EventLogObserver::new());
        bus.register(observer.clone());

        bus.notify(UplinkEvent::ProcessingComplete).await;
        bus.notify(UplinkEvent::ProcessingComplete).await;
        assert_eq!(observer.logged(), 2);

        let query = LifecycleQuery::IsOnStateCompute { token_id: 7 };
        assert!(bus.query(query, true).await);
        assert!(!bus.query(query, false).await);
    }
}
