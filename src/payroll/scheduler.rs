use std::future::Future;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::FiringOutcome;
use crate::date_util::parse_weekday;
use crate::error::{Error, Result};

/// Longest single sleep before the wall clock is read again.
pub const CLOCK_RECHECK: std::time::Duration = std::time::Duration::from_secs(60);

/// Source of local wall-clock time for the scheduler.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;

    /// Resolve once `now()` has reached `deadline`.
    ///
    /// The wall clock is read again at least every [`CLOCK_RECHECK`], so a
    /// DST change or a clock adjustment while asleep moves the wake-up with it.
    fn sleep_until(&self, deadline: NaiveDateTime) -> impl Future<Output = ()> + Send {
        async move {
            loop {
                let remaining = (deadline - self.now()).to_std().unwrap_or_default();
                if remaining.is_zero() {
                    break;
                }
                tokio::time::sleep(remaining.min(CLOCK_RECHECK)).await;
            }
        }
    }
}

/// The system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Work done on each scheduled firing. `at` is the trigger instant.
pub trait RecomputeJob: Send + Sync + 'static {
    fn fire(&self, at: NaiveDateTime) -> impl Future<Output = Result<FiringOutcome>> + Send;
}

/// A fixed weekday and time of day, recurring every week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyTrigger {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Default for WeeklyTrigger {
    /// Saturday 23:59, after the last shift of the week.
    fn default() -> Self {
        Self {
            weekday: Weekday::Sat,
            time: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl WeeklyTrigger {
    pub fn new(weekday: Weekday, time: NaiveTime) -> Self {
        Self { weekday, time }
    }

    /// Parse a weekday name (`saturday`, `sat`) and an `HH:MM` time.
    pub fn parse(weekday: &str, time: &str) -> Result<Self> {
        let weekday = parse_weekday(weekday)
            .ok_or_else(|| Error::Validation(format!("unknown weekday '{weekday}'")))?;
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| Error::Validation(format!("invalid time '{time}', expected HH:MM")))?;
        Ok(Self { weekday, time })
    }

    /// The first trigger instant strictly after `now`.
    pub fn next_fire_after(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();
        let days_ahead = (self.weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        let candidate = (today + Duration::days(days_ahead)).and_time(self.time);
        if candidate > now {
            candidate
        } else {
            candidate + Duration::weeks(1)
        }
    }
}

impl std::fmt::Display for WeeklyTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.weekday, self.time.format("%H:%M"))
    }
}

/// Owned handle to a running scheduler task.
pub struct SchedulerHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop future firings and wait for the task to exit. A firing already
    /// in progress runs to completion first.
    pub async fn shutdown(self) -> Result<()> {
        self.token.cancel();
        self.wait().await
    }

    /// Wait for the task to exit without requesting it.
    pub async fn wait(self) -> Result<()> {
        self.join
            .await
            .map_err(|e| Error::Other(format!("scheduler task failed: {e}")))
    }
}

/// Spawn the weekly loop.
///
/// The loop sleeps until the next trigger instant, fires `job` at that
/// instant, and repeats. A failed firing is logged and the loop waits for the
/// next trigger; missed firings are not retried. Cancelling `parent` (or
/// calling [`SchedulerHandle::shutdown`]) ends the loop at its next wait.
pub fn start_scheduler<J, C>(
    job: Arc<J>,
    clock: C,
    trigger: WeeklyTrigger,
    parent: &CancellationToken,
) -> SchedulerHandle
where
    J: RecomputeJob,
    C: Clock,
{
    let token = parent.child_token();
    let loop_token = token.clone();

    let join = tokio::spawn(async move {
        log::info!("Pay scheduler started, trigger {trigger}");
        loop {
            let next = trigger.next_fire_after(clock.now());
            log::debug!("Next pay firing at {next}");

            tokio::select! {
                biased;

                _ = loop_token.cancelled() => break,
                _ = clock.sleep_until(next) => {}
            }

            match job.fire(next).await {
                Ok(FiringOutcome::Recorded(record)) => {
                    log::debug!("Pay firing at {next} stored record {}", record.id);
                }
                Ok(FiringOutcome::AlreadyRecorded(record)) => {
                    log::debug!("Pay firing at {next} found record {} already stored", record.id);
                }
                Err(e) => {
                    log::error!("Pay firing at {next} failed: {e}");
                }
            }
        }
        log::info!("Pay scheduler stopped");
    });

    SchedulerHandle { token, join }
}
