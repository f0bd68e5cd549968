//! Sensor Collector
//!
//! Polls the sensor endpoint at a fixed cadence and appends every
//! successful sample to the reading store. Failures are logged and the
//! cycle is skipped; the loop only ends with the process.

mod collector;
mod error;
mod sensor;
mod status;

pub use collector::{spawn, Collector, CollectorConfig, CycleOutcome};
pub use error::SensorError;
pub use sensor::{SensorClient, SensorSample};
pub use status::{CollectorHandle, CollectorSnapshot, CollectorStatus};
