//! # Run and network presets
//!
//! Every scale name maps to a fixed row in a lookup table. The run table
//! drives the control loop, the network table shapes the model; the two are
//! selected independently so a small network can be trained on a long run.

pub mod network;
pub mod run;
pub mod schedule;

pub use network::{CellKind, LayerSpec, NetworkConfig};
pub use run::{RunConfig, Scale};
pub use schedule::ScheduleConfig;
