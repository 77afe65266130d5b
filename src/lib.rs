//! Household smart-utility device simulator.
//!
//! A [`sim::household::Household`] flips random devices on a day/night
//! quota, and a [`sim::driver::Driver`] pushes one consumption reading per
//! active or just-shut-down device to external collectors every iteration.

/// REST API over the node repository.
#[cfg(feature = "api")]
pub mod api;
pub mod cli;
/// TOML scenario configuration and presets.
pub mod config;
pub mod devices;
/// Cycle log export.
pub mod io;
pub mod logging;
pub mod reporting;
/// Scheduler, dispatcher, clock and driver.
pub mod sim;
pub mod storage;
pub mod telemetry;
pub mod transport;
