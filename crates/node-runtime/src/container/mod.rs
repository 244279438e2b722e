//! # Subsystem Container
//!
//! Configuration plus the wiring that turns it into running subsystems.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NodeConfig};
pub use subsystems::{ContainerError, SubsystemContainer};
