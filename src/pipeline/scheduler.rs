//! Scheduler loop.
//!
//! Runs one cycle at a time, forever. A cycle that returns an error or
//! panics is logged and followed by a shorter recovery delay; nothing but
//! the watermark store carries state from one iteration to the next.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::Result;
use crate::metrics::{CycleFailed, InternalEvent};
use crate::models::ScheduleConfig;
use crate::pipeline::cycle::CycleSummary;

/// A unit of work the scheduler repeats.
#[async_trait]
pub trait Cycle: Send {
    async fn run_cycle(&mut self) -> Result<CycleSummary>;
}

/// Drives a [`Cycle`] on a fixed interval.
pub struct Scheduler<C> {
    cycle: C,
    interval: Duration,
    recovery_delay: Duration,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

impl<C: Cycle> Scheduler<C> {
    pub fn new(cycle: C, interval: Duration, recovery_delay: Duration) -> Self {
        Self {
            cycle,
            interval,
            recovery_delay,
        }
    }

    pub fn from_config(cycle: C, schedule: &ScheduleConfig) -> Self {
        Self::new(cycle, schedule.check_interval(), schedule.recovery_delay())
    }

    /// Run one iteration and return how long to wait before the next.
    pub async fn tick(&mut self) -> Duration {
        let outcome = AssertUnwindSafe(self.cycle.run_cycle())
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(summary)) => {
                log::info!(
                    "Processed {} new licenses: {} published, {} failed, {} skipped. \
                     Sleeping for {} minutes.",
                    summary.fetched,
                    summary.published,
                    summary.failed,
                    summary.skipped,
                    self.interval.as_secs() / 60
                );
                self.interval
            }
            Ok(Err(e)) => {
                log::error!(
                    "Error in main loop: {e}. Retrying in {} seconds.",
                    self.recovery_delay.as_secs()
                );
                CycleFailed { stage: "cycle" }.emit();
                self.recovery_delay
            }
            Err(payload) => {
                log::error!(
                    "Cycle panicked: {}. Retrying in {} seconds.",
                    panic_message(payload.as_ref()),
                    self.recovery_delay.as_secs()
                );
                CycleFailed { stage: "panic" }.emit();
                self.recovery_delay
            }
        }
    }

    /// Run until the process is terminated.
    pub async fn run(mut self) {
        log::info!(
            "Starting scheduler (checking every {} minutes)",
            self.interval.as_secs() / 60
        );
        loop {
            let wait = self.tick().await;
            tokio::time::sleep(wait).await;
        }
    }
}
