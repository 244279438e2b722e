//! # Distribution Subsystem
//!
//! Delivers committed transactions to downstream targets after the local
//! commit. Sinks run concurrently; each retries independently and a sink
//! that gives up is logged and counted, never reported to the pipeline.
//!
//! | Sink      | Target                                    | Payload            |
//! |-----------|-------------------------------------------|--------------------|
//! | archive   | upload gateway                            | committed payload  |
//! | prover    | `POST {url}/batch-payloads`               | full batch         |
//! | relay     | `POST {url}/streams/{id}/publish` per id  | full batch         |

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::archive::ArchiveSink;
pub use adapters::prover::ProverSink;
pub use adapters::relay::RelaySink;
pub use domain::batch::{DistributionBatch, Trigger};
pub use domain::errors::SinkError;
pub use domain::tags::{archive_tags, Tag};
pub use ports::inbound::{DistributionApi, DistributionReport};
pub use ports::outbound::{DistributionSink, RecordingSink};
pub use service::FanOut;
