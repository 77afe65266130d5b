use chrono::{Local, NaiveDateTime, TimeDelta};

/// Where a [`ReplayClock`] stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Local wall-clock time, re-read on every tick.
    WallClock,
    /// A fixed instant (exclusive).
    Fixed(NaiveDateTime),
}

impl Horizon {
    fn reached(&self, t: NaiveDateTime) -> bool {
        match self {
            Self::WallClock => t >= Local::now().naive_local(),
            Self::Fixed(end) => t >= *end,
        }
    }
}

/// A synthetic clock that replays time in fixed increments up to a horizon.
///
/// The `ReplayClock` hands out timestamps independently of how long real
/// processing takes between ticks.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use waveslab_sim::sim::clock::{Horizon, ReplayClock};
///
/// let start = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = start + TimeDelta::minutes(1);
/// let mut clock = ReplayClock::new(start, TimeDelta::seconds(20), Horizon::Fixed(end));
///
/// let mut ticks = Vec::new();
/// clock.run(|t| ticks.push(t));
/// assert_eq!(ticks.len(), 3);
/// assert_eq!(ticks[2], start + TimeDelta::seconds(40));
/// ```
#[derive(Debug, Clone)]
pub struct ReplayClock {
    /// Timestamp handed out by the next tick
    current: NaiveDateTime,
    /// Synthetic time advanced per tick
    increment: TimeDelta,
    horizon: Horizon,
}

impl ReplayClock {
    /// Creates a replay clock.
    ///
    /// # Arguments
    ///
    /// * `start` - First timestamp to hand out
    /// * `increment` - Synthetic time advanced per tick (must be positive)
    /// * `horizon` - Where the replay stops
    ///
    /// # Panics
    ///
    /// Panics if `increment` is not positive.
    pub fn new(start: NaiveDateTime, increment: TimeDelta, horizon: Horizon) -> Self {
        assert!(increment > TimeDelta::zero(), "increment must be > 0");
        Self {
            current: start,
            increment,
            horizon,
        }
    }

    /// Timestamp the next tick will return.
    pub fn current(&self) -> NaiveDateTime {
        self.current
    }

    pub fn increment(&self) -> TimeDelta {
        self.increment
    }

    /// Advances the clock by one increment.
    ///
    /// # Returns
    ///
    /// * `Some(timestamp)` - The timestamp before advancing
    /// * `None` - If the horizon has been reached
    pub fn tick(&mut self) -> Option<NaiveDateTime> {
        if self.horizon.reached(self.current) {
            return None;
        }
        let now = self.current;
        // past the end of the calendar, every horizon counts as reached
        self.current = now
            .checked_add_signed(self.increment)
            .unwrap_or(NaiveDateTime::MAX);
        Some(now)
    }

    /// Runs a function for each remaining tick.
    ///
    /// With [`Horizon::WallClock`] this only terminates once replay time
    /// has caught up with real time.
    pub fn run(&mut self, mut f: impl FnMut(NaiveDateTime)) {
        while let Some(t) = self.tick() {
            f(t);
        }
    }
}
