//! # Shared Bus - Uplink Lifecycle Events
//!
//! Typed events emitted by the uplink pipeline, a broadcast bus for passive
//! subscribers, and a registry of observers that can also vote on queries.
//!
//! ```text
//! ┌──────────────┐   notify()    ┌──────────────┐   on_event()   ┌───────────┐
//! │  Processor   │ ────────────▶ │ LifecycleBus │ ─────────────▶ │ Observers │
//! └──────────────┘               └──────┬───────┘                └───────────┘
//!                                       │ publish()
//!                                       ▼
//!                                ┌──────────────┐   recv()
//!                                │  Event Bus   │ ─────────▶ subscribers
//!                                └──────────────┘
//! ```
//!
//! Observer failures are logged and never reach the pipeline.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod observer;
pub mod publisher;
pub mod subscriber;

pub use events::{DropReason, EventFilter, EventTopic, UplinkEvent};
pub use observer::{CombinePolicy, LifecycleBus, LifecycleObserver, LifecycleQuery, ObserverError};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
