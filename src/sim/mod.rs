/// Synthetic replay clock.
pub mod clock;
/// Concurrent telemetry fan-out.
pub mod dispatch;
pub mod driver;
/// Device cycle scheduler.
pub mod household;
pub mod types;
