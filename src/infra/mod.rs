//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod preload;
pub mod telemetry;
pub mod transport;
