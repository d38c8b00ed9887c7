//! Periodic synchronization runner.
//!
//! [`Scheduler::run`] sleeps in short polls so a stop request is noticed
//! within one poll period instead of after a whole interval.
//! [`spawn_background`] re-launches the current executable detached from the
//! terminal, in its own process group.

use crate::config::{MAX_SCHEDULER_HOURS, MIN_SCHEDULER_HOURS};
use anyhow::{Context, Result, bail};
use command_group::CommandGroup;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level, debug, info, span};

/// Seconds in one scheduler hour.
const SECS_PER_HOUR: u64 = 3600;

/// Runs a job every `interval` until stopped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    poll: Duration,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    /// A scheduler running every `hours` hours.
    ///
    /// # Errors
    ///
    /// Returns an error if `hours` is outside 1-24.
    pub fn new(hours: u32) -> Result<Self> {
        if !(MIN_SCHEDULER_HOURS..=MAX_SCHEDULER_HOURS).contains(&hours) {
            bail!(
                "Scheduler interval must be between {MIN_SCHEDULER_HOURS} and {MAX_SCHEDULER_HOURS} hours, got {hours}"
            );
        }
        Ok(Self::with_interval(Duration::from_secs(
            u64::from(hours) * SECS_PER_HOUR,
        )))
    }

    /// A scheduler with an arbitrary interval. The poll period is capped at
    /// one second.
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            poll: interval.min(Duration::from_secs(1)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Handle that stops the loop when set to `true`.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Requests the loop to stop after the current poll.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Runs `job` once per interval, the first time one interval after the
    /// call. Stops after `max_runs` runs when given, or when stopped.
    ///
    /// Returns the number of runs. A failing job is logged and does not end
    /// the loop.
    pub fn run<F>(&self, mut job: F, max_runs: Option<usize>) -> usize
    where
        F: FnMut() -> Result<()>,
    {
        let span = span!(Level::INFO, "scheduler", interval = %humantime::format_duration(self.interval));
        let _guard = span.enter();
        info!("Scheduler started");

        let mut runs = 0;
        let mut next = Instant::now() + self.interval;
        while !self.is_stopped() && max_runs.is_none_or(|max| runs < max) {
            let now = Instant::now();
            if now < next {
                std::thread::sleep(self.poll.min(next - now));
                continue;
            }

            runs += 1;
            debug!(run = runs, "Running scheduled job");
            if let Err(e) = job() {
                tracing::error!(run = runs, error = %e, "Scheduled job failed");
            }
            next += self.interval;
            // A job longer than the interval does not trigger a burst of catch-up runs
            let now = Instant::now();
            if next < now {
                next = now + self.interval;
            }
        }

        info!(runs, "Scheduler stopped");
        runs
    }
}

/// Re-launches the current executable with `args`, detached in its own
/// process group with null stdio. Returns the child's process id.
///
/// # Errors
///
/// Returns an error if the current executable cannot be located or spawned.
pub fn spawn_background(args: &[String]) -> Result<u32> {
    let exe = std::env::current_exe().context("Could not locate the driversync executable")?;
    spawn_detached(&exe, args)
}

fn spawn_detached(program: &std::path::Path, args: &[String]) -> Result<u32> {
    let span = span!(Level::DEBUG, "spawn_background", program = %program.display());
    let _guard = span.enter();

    let mut group = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .group_spawn()
        .with_context(|| format!("Failed to spawn background process: {}", program.display()))?;

    let pid = group.inner().id();
    info!(pid, args = ?args, "Background scheduler spawned");
    Ok(pid)
}
