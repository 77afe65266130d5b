//! Core simulation types: cycle reports, per-iteration records and run totals.

use std::fmt;

use chrono::NaiveDateTime;

/// Outcome of one fired switching cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Monotonic cycle number, starting at 1.
    pub cycle: u64,
    /// Timestamp the cycle fired at.
    pub at: NaiveDateTime,
    /// Ids drawn for this cycle, in draw order.
    pub selected: Vec<String>,
    /// Ids switched from `OFF` to `ON`.
    pub switched_on: Vec<String>,
    /// Ids switched from `ON` to `OFF`.
    pub switched_off: Vec<String>,
    /// Ids whose flip failed, with the reason.
    pub failures: Vec<(String, String)>,
}

impl CycleReport {
    /// Number of devices whose status actually changed.
    pub fn switched(&self) -> usize {
        self.switched_on.len() + self.switched_off.len()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} at {}: {} selected, {} on, {} off, {} failed",
            self.cycle,
            self.at,
            self.selected.len(),
            self.switched_on.len(),
            self.switched_off.len(),
            self.failures.len()
        )
    }
}

/// One driver iteration as written to the cycle log.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    /// Iteration index, starting at 0.
    pub iteration: u64,
    pub timestamp: NaiveDateTime,
    /// Cycle number if a switching cycle fired in this iteration.
    pub switch_cycle: Option<u64>,
    /// Devices whose status changed in this iteration.
    pub switched: usize,
    /// Active devices reported by the repository.
    pub active: usize,
    /// Drained pending shutdowns.
    pub shutdowns: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// How a driver run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The cadence ran out of ticks (historical replay reached its horizon).
    CaughtUp,
    /// [`StopHandle::stop`](super::driver::StopHandle::stop) was called.
    Stopped,
}

impl fmt::Display for RunEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaughtUp => f.write_str("caught up"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Totals of a finished driver run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub iterations: u64,
    /// Switching cycles that fired.
    pub switch_cycles: u64,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Timestamp of the last iteration, if any ran.
    pub last_timestamp: Option<NaiveDateTime>,
    pub end: RunEnd,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            iterations: 0,
            switch_cycles: 0,
            delivered: 0,
            failed: 0,
            skipped: 0,
            last_timestamp: None,
            end: RunEnd::Stopped,
        }
    }

    /// Adds one iteration's record to the totals.
    pub(crate) fn absorb(&mut self, record: &CycleRecord) {
        self.iterations += 1;
        if record.switch_cycle.is_some() {
            self.switch_cycles += 1;
        }
        self.delivered += record.delivered;
        self.failed += record.failed;
        self.skipped += record.skipped;
        self.last_timestamp = Some(record.timestamp);
    }

    /// Share of attempted deliveries that succeeded, in `[0, 1]`.
    ///
    /// Returns 1.0 when nothing was attempted.
    pub fn delivery_rate(&self) -> f64 {
        let attempted = self.delivered + self.failed;
        if attempted == 0 {
            1.0
        } else {
            self.delivered as f64 / attempted as f64
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Run Summary ---")?;
        writeln!(f, "Ended:            {}", self.end)?;
        writeln!(f, "Iterations:       {}", self.iterations)?;
        writeln!(f, "Switch cycles:    {}", self.switch_cycles)?;
        writeln!(f, "Delivered:        {}", self.delivered)?;
        writeln!(f, "Failed:           {}", self.failed)?;
        writeln!(f, "Skipped:          {}", self.skipped)?;
        writeln!(f, "Delivery rate:    {:.1}%", self.delivery_rate() * 100.0)?;
        match self.last_timestamp {
            Some(ts) => write!(f, "Last timestamp:   {ts}"),
            None => write!(f, "Last timestamp:   -"),
        }
    }
}
