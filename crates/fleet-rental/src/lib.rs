//! Vehicle rental fleet operations: bookings, payments, maintenance, penalties and
//! branch deployments over a pluggable persistence port.

pub mod config;
pub mod error;
pub mod operations;
pub mod telemetry;

pub use operations::FleetServices;
