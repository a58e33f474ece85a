//! Non-blocking timers for the slow reports
//!
//! The heartbeat loop owns a [`SlowSchedule`] and asks it, once per
//! iteration, which reports are due. Asking never waits: a timer that has
//! not elapsed simply reports nothing, so a 24 hour report can neither stall
//! nor be starved by the 5 second heartbeat.

use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

/// A fixed-period timer that can be polled without blocking
#[derive(Debug)]
pub struct Periodic {
    ticker: Interval,
}

impl Periodic {
    /// First due one full `period` from now
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }

    pub fn period(&self) -> Duration {
        self.ticker.period()
    }

    /// Consume an elapsed tick, if any, without waiting
    pub fn poll_due(&mut self) -> bool {
        self.ticker.tick().now_or_never().is_some()
    }
}

/// Reports driven from inside the heartbeat loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowTask {
    OpenPorts,
    ProcessStats,
}

/// One timer per slow report
#[derive(Debug)]
pub struct SlowSchedule {
    timers: Vec<(SlowTask, Periodic)>,
}

impl SlowSchedule {
    pub fn new(open_ports: Duration, process_stats: Duration) -> Self {
        Self {
            timers: vec![
                (SlowTask::OpenPorts, Periodic::new(open_ports)),
                (SlowTask::ProcessStats, Periodic::new(process_stats)),
            ],
        }
    }

    /// Every report whose timer elapsed since the last poll
    pub fn poll_due(&mut self) -> Vec<SlowTask> {
        let due: Vec<SlowTask> = self
            .timers
            .iter_mut()
            .filter_map(|(task, timer)| timer.poll_due().then_some(*task))
            .collect();

        if !due.is_empty() {
            trace!("slow tasks due: {due:?}");
        }

        due
    }
}
