//! # Lifecycle Observers
//!
//! Registered callbacks invoked as the pipeline emits events, plus typed
//! queries whose answers are merged by a declared [`CombinePolicy`].
//!
//! ```text
//! pipeline ──notify(event)──▶ LifecycleBus ──▶ observer.on_event()   (CollectIgnore)
//!                                  │
//!                                  └──────────▶ InMemoryEventBus::publish
//!
//! pipeline ──query(IsOnStateCompute)──▶ observer.answer()  (AllMustBeTrue)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::TokenId;
use thiserror::Error;
use tracing::warn;

use crate::events::UplinkEvent;
use crate::publisher::InMemoryEventBus;

/// Failure reported by an observer. Never propagated to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{observer}: {reason}")]
pub struct ObserverError {
    /// Observer name.
    pub observer: String,
    /// What went wrong.
    pub reason: String,
}

/// How the answers of several observers are merged into one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinePolicy {
    /// Every vote must be `true`; the default participates in the AND.
    AllMustBeTrue,
    /// The first observer that answers decides; the default otherwise.
    FirstSuccess,
    /// Answers are ignored; the default stands.
    CollectIgnore,
}

impl CombinePolicy {
    /// Merge observer votes into a final value.
    ///
    /// `None` votes (observer has no opinion) and failed votes are skipped.
    pub fn combine<I>(self, default: bool, votes: I) -> bool
    where
        I: IntoIterator<Item = Result<Option<bool>, ObserverError>>,
    {
        let mut answers = votes.into_iter().filter_map(|vote| match vote {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Observer vote failed");
                None
            }
        });

        match self {
            CombinePolicy::AllMustBeTrue => answers.fold(default, |acc, v| acc && v),
            CombinePolicy::FirstSuccess => answers.next().unwrap_or(default),
            CombinePolicy::CollectIgnore => {
                answers.for_each(drop);
                default
            }
        }
    }
}

/// Typed questions the pipeline puts to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleQuery {
    /// Should the device be switched on?
    IsOnStateCompute {
        /// Device token id.
        token_id: TokenId,
    },
}

impl LifecycleQuery {
    /// Policy declared for this query kind.
    pub fn policy(&self) -> CombinePolicy {
        match self {
            LifecycleQuery::IsOnStateCompute { .. } => CombinePolicy::AllMustBeTrue,
        }
    }
}

/// A pluggable participant in the uplink lifecycle.
///
/// Both methods default to doing nothing, so an observer implements only
/// what it cares about.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Called for every emitted event.
    async fn on_event(&self, _event: &UplinkEvent) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Answer a query. `Ok(None)` abstains.
    async fn answer(&self, _query: &LifecycleQuery) -> Result<Option<bool>, ObserverError> {
        Ok(None)
    }
}

/// Registered observers plus the broadcast bus.
#[derive(Default)]
pub struct LifecycleBus {
    observers: RwLock<Vec<Arc<dyn LifecycleObserver>>>,
    events: InMemoryEventBus,
}

impl LifecycleBus {
    /// Empty bus with the default broadcast capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Observers run in registration order.
    pub fn register(&self, observer: Arc<dyn LifecycleObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// The broadcast bus events are mirrored onto.
    pub fn events(&self) -> &InMemoryEventBus {
        &self.events
    }

    fn snapshot(&self) -> Vec<Arc<dyn LifecycleObserver>> {
        self.observers.read().clone()
    }

    /// Deliver an event to every observer and the broadcast bus.
    pub async fn notify(&self, event: UplinkEvent) {
        let observers = self.snapshot();
        let mut outcomes = Vec::with_capacity(observers.len());
        for observer in &observers {
            outcomes.push(observer.on_event(&event).await.map(|()| None));
        }
        event.policy().combine(true, outcomes);
        self.events.publish_now(event);
    }

    /// Ask every observer and merge their answers with `default`.
    pub async fn query(&self, query: LifecycleQuery, default: bool) -> bool {
        let policy = query.policy();
        let observers = self.snapshot();
        let mut votes = Vec::with_capacity(observers.len());
        for observer in &observers {
            let vote = observer.answer(&query).await;
            let decided = matches!(vote, Ok(Some(_)));
            votes.push(vote);
            if policy == CombinePolicy::FirstSuccess && decided {
                break;
            }
        }
        policy.combine(default, votes)
    }
}
