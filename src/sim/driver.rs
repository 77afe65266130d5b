//! Simulation driver: sequences the household, repository and dispatcher on
//! a cadence until it runs out of ticks or is stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::ReplayClock;
use super::dispatch::Dispatcher;
use super::household::Household;
use super::types::{CycleRecord, RunEnd, RunReport};
use crate::devices::WaveNode;
use crate::io::export::CycleLog;
use crate::transport::Transport;

/// Supplies iteration timestamps and decides when a run is over.
pub trait Cadence: Send {
    /// Timestamp of the next iteration, or `None` when the run is complete.
    fn next_tick(&mut self) -> Option<NaiveDateTime>;

    /// Real time to wait between iterations.
    fn pause(&self) -> Duration;
}

/// Wall-clock cadence that never runs out.
#[derive(Debug, Clone)]
pub struct RealTime {
    interval: Duration,
}

impl RealTime {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Cadence for RealTime {
    fn next_tick(&mut self) -> Option<NaiveDateTime> {
        Some(Local::now().naive_local())
    }

    fn pause(&self) -> Duration {
        self.interval
    }
}

/// Replays synthetic time until its clock reaches the horizon.
#[derive(Debug, Clone)]
pub struct Historical {
    clock: ReplayClock,
    pause: Duration,
}

impl Historical {
    pub fn new(clock: ReplayClock) -> Self {
        Self {
            clock,
            pause: Duration::ZERO,
        }
    }

    /// Waits `pause` of real time between replayed iterations.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl Cadence for Historical {
    fn next_tick(&mut self) -> Option<NaiveDateTime> {
        self.clock.tick()
    }

    fn pause(&self) -> Duration {
        self.pause
    }
}

/// Cloneable handle that stops a running [`Driver`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
    running: Arc<AtomicBool>,
}

impl StopHandle {
    /// Requests a cooperative stop.
    ///
    /// A fan-out already in progress finishes; no new iteration starts.
    /// Calling this when the driver is not running, or more than once, does
    /// nothing. Returns `true` if this call requested the stop.
    pub fn stop(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            debug!("Stop requested while driver is not running");
            return false;
        }
        if self.token.is_cancelled() {
            return false;
        }
        info!("Stopping simulation");
        self.token.cancel();
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag and closes the transport on every exit path.
struct RunGuard<'a, T: Transport> {
    transport: &'a T,
    running: &'a AtomicBool,
}

impl<T: Transport> Drop for RunGuard<'_, T> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.transport.close();
    }
}

/// Runs the simulation loop for one household.
pub struct Driver<C, T> {
    household: Household,
    dispatcher: Dispatcher<T>,
    cadence: C,
    token: CancellationToken,
    running: Arc<AtomicBool>,
    cycle_log: Option<CycleLog>,
}

impl<C: Cadence, T: Transport> Driver<C, T> {
    /// Creates a driver.
    ///
    /// # Arguments
    ///
    /// * `household` - Scheduler flipping devices; active devices are read
    ///   from its repository
    /// * `transport` - Delivery capability for readings
    /// * `cadence` - Iteration timestamps and termination
    pub fn new(household: Household, transport: T, cadence: C) -> Self {
        Self {
            household,
            dispatcher: Dispatcher::new(transport),
            cadence,
            token: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
            cycle_log: None,
        }
    }

    /// Writes one CSV row per iteration to `log`.
    pub fn with_cycle_log(mut self, log: CycleLog) -> Self {
        self.cycle_log = Some(log);
        self
    }

    pub fn handle(&self) -> StopHandle {
        StopHandle {
            token: self.token.clone(),
            running: Arc::clone(&self.running),
        }
    }

    /// Runs iterations until the cadence is exhausted or the driver is stopped.
    ///
    /// Each iteration: tick the household, collect active devices plus
    /// drained shutdowns, dispatch them, record the iteration, then pause.
    /// The transport is closed when this returns.
    pub async fn run(self) -> RunReport {
        let Self {
            mut household,
            dispatcher,
            mut cadence,
            token,
            running,
            mut cycle_log,
        } = self;

        running.store(true, Ordering::SeqCst);
        let _guard = RunGuard {
            transport: dispatcher.transport(),
            running: &running,
        };
        info!(transport = dispatcher.transport().name(), "Simulation started");

        let mut report = RunReport::new();
        let mut iteration = 0_u64;
        report.end = loop {
            if token.is_cancelled() {
                break RunEnd::Stopped;
            }
            let Some(now) = cadence.next_tick() else {
                break RunEnd::CaughtUp;
            };

            let cycle = household.tick(now);
            let active = household.repo().list_active().unwrap_or_else(|e| {
                warn!(%now, error = %e, "Cannot list active devices");
                Vec::new()
            });
            let shutdowns = household.drain_pending_shutdowns();
            let (active_count, shutdown_count) = (active.len(), shutdowns.len());
            let batch = merge_batch(active, shutdowns);

            if token.is_cancelled() {
                break RunEnd::Stopped;
            }
            let summary = dispatcher.send_all(&batch, now).await;

            let record = CycleRecord {
                iteration,
                timestamp: now,
                switch_cycle: cycle.as_ref().map(|c| c.cycle),
                switched: cycle.as_ref().map_or(0, |c| c.switched()),
                active: active_count,
                shutdowns: shutdown_count,
                delivered: summary.delivered,
                failed: summary.failed,
                skipped: summary.skipped,
            };
            report.absorb(&record);
            if let Some(log) = cycle_log.as_mut() {
                if let Err(e) = log.append(&record) {
                    warn!(error = %e, "Cannot write cycle log row");
                }
            }
            iteration += 1;

            let pause = cadence.pause();
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = token.cancelled() => break RunEnd::Stopped,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        };

        info!(
            end = %report.end,
            iterations = report.iterations,
            switch_cycles = report.switch_cycles,
            delivered = report.delivered,
            failed = report.failed,
            "Simulation finished"
        );
        report
    }
}

/// Active devices followed by shutdown snapshots not already present.
fn merge_batch(mut active: Vec<WaveNode>, shutdowns: Vec<WaveNode>) -> Vec<WaveNode> {
    for node in shutdowns {
        if !active.iter().any(|n| n.id == node.id) {
            active.push(node);
        }
    }
    active
}
