//! Device cycle scheduler: decides when a switching cycle is due and which
//! devices it flips.

use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use tracing::{debug, info, warn};

use super::types::CycleReport;
use crate::devices::{NodeStatus, WaveNode};
use crate::storage::NodeRepository;

/// When cycles fire and how many devices each one flips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchPolicy {
    /// Minimum time between two cycles.
    pub interval: TimeDelta,
    /// Devices flipped per daytime cycle.
    pub day_quota: usize,
    /// Devices flipped per night-time cycle.
    pub night_quota: usize,
    /// First daytime hour (inclusive).
    pub day_start_hour: u32,
    /// First night-time hour (inclusive).
    pub night_start_hour: u32,
}

impl Default for SwitchPolicy {
    fn default() -> Self {
        Self {
            interval: TimeDelta::minutes(15),
            day_quota: 5,
            night_quota: 3,
            day_start_hour: 6,
            night_start_hour: 21,
        }
    }
}

impl SwitchPolicy {
    /// Policy with the default quotas and the given interval.
    pub fn every(interval: TimeDelta) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    pub fn is_daytime(&self, now: NaiveDateTime) -> bool {
        (self.day_start_hour..self.night_start_hour).contains(&now.hour())
    }

    /// Devices to flip for a cycle firing at `now`, before capping at the
    /// fleet size.
    pub fn quota(&self, now: NaiveDateTime) -> usize {
        if self.is_daytime(now) {
            self.day_quota
        } else {
            self.night_quota
        }
    }
}

/// Simulated household that flips random devices on a fixed cadence.
///
/// The scheduler owns its clock state (`last_switch_time`, cycle counter)
/// and the pending shutdown set; device state lives in the repository.
pub struct Household {
    repo: Arc<dyn NodeRepository>,
    policy: SwitchPolicy,
    rng: StdRng,
    last_switch_time: Option<NaiveDateTime>,
    cycle: u64,
    pending_shutdowns: Vec<WaveNode>,
}

impl Household {
    /// Creates a household over `repo`.
    ///
    /// # Arguments
    ///
    /// * `repo` - Repository holding the fleet
    /// * `policy` - Switching interval and quotas
    /// * `seed` - Seed for device selection; `None` draws from OS entropy
    pub fn new(repo: Arc<dyn NodeRepository>, policy: SwitchPolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            repo,
            policy,
            rng,
            last_switch_time: None,
            cycle: 0,
            pending_shutdowns: Vec::new(),
        }
    }

    /// Repository holding the fleet this household switches.
    pub fn repo(&self) -> &Arc<dyn NodeRepository> {
        &self.repo
    }

    pub fn policy(&self) -> &SwitchPolicy {
        &self.policy
    }

    /// Number of cycles fired so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn last_switch_time(&self) -> Option<NaiveDateTime> {
        self.last_switch_time
    }

    /// Runs a switching cycle if one is due at `now`.
    ///
    /// The first call always fires. Later calls fire only once `interval`
    /// has elapsed since the previous firing and leave all state untouched
    /// otherwise.
    ///
    /// # Returns
    ///
    /// * `Some(report)` - A cycle fired
    /// * `None` - Not due yet, or the fleet was empty or unreadable
    pub fn tick(&mut self, now: NaiveDateTime) -> Option<CycleReport> {
        if let Some(last) = self.last_switch_time {
            if now - last < self.policy.interval {
                return None;
            }
        }
        self.last_switch_time = Some(now);

        let fleet = match self.repo.list_all() {
            Ok(fleet) => fleet,
            Err(e) => {
                warn!(%now, error = %e, "Cannot read fleet, skipping cycle");
                return None;
            }
        };
        if fleet.is_empty() {
            warn!(%now, "No devices found in repository");
            return None;
        }

        let target = self.policy.quota(now).min(fleet.len());
        let picks = index::sample(&mut self.rng, fleet.len(), target);

        self.cycle += 1;
        info!(cycle = self.cycle, %now, target, fleet = fleet.len(), "Switching cycle");

        let mut report = CycleReport {
            cycle: self.cycle,
            at: now,
            ..CycleReport::default()
        };
        for i in picks {
            let node = &fleet[i];
            report.selected.push(node.id.clone());
            self.flip(node, &mut report);
        }
        info!(%report, "Cycle finished");
        Some(report)
    }

    fn flip(&mut self, node: &WaveNode, report: &mut CycleReport) {
        let target = node.status.toggled();
        // Snapshot before the flip so the zero reading survives it.
        let snapshot = (target == NodeStatus::Off).then(|| node.shutdown_snapshot());

        match self.repo.set_status(&node.id, target) {
            Ok(_) => {
                debug!(node_id = %node.id, status = %target, "Switched");
                match snapshot {
                    Some(snapshot) => {
                        self.pending_shutdowns.push(snapshot);
                        report.switched_off.push(node.id.clone());
                    }
                    None => report.switched_on.push(node.id.clone()),
                }
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "Failed to switch device");
                report.failures.push((node.id.clone(), e.to_string()));
            }
        }
    }

    /// Returns the devices switched off since the last drain, with zero
    /// consumption, and clears the set.
    pub fn drain_pending_shutdowns(&mut self) -> Vec<WaveNode> {
        std::mem::take(&mut self.pending_shutdowns)
    }
}
