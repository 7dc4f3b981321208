//! Daily timer for the trending/expiry sweep.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tracing::{info, warn};

use super::WorkerHandle;

/// First instant strictly after `after` whose UTC time is `hour:00:00`.
/// Hours above 23 are clamped.
pub fn next_occurrence(after: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = after.date_naive().and_time(time).and_utc();
    if today > after {
        return today;
    }
    after
        .date_naive()
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(time).and_utc())
        .unwrap_or(today)
}

/// Runs a job once a day at a fixed UTC hour, on its own thread.
#[derive(Debug)]
pub struct DailyScheduler;

impl DailyScheduler {
    pub fn spawn<F>(name: &'static str, hour_utc: u32, mut job: F) -> std::io::Result<WorkerHandle>
    where
        F: FnMut(DateTime<Utc>) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        // Re-check the clock at least this often so wall-clock jumps are noticed.
        let max_wait = Duration::from_secs(60);

        let join = thread::Builder::new().name(name.to_string()).spawn(move || {
            let mut due = next_occurrence(Utc::now(), hour_utc);
            info!(scheduler = name, next_run = %due, "scheduler started");

            loop {
                let now = Utc::now();
                if now >= due {
                    info!(scheduler = name, "scheduled run starting");
                    job(now);
                    due = next_occurrence(Utc::now(), hour_utc);
                    info!(scheduler = name, next_run = %due, "scheduled run finished");
                    continue;
                }

                let wait = (due - now).to_std().unwrap_or(Duration::ZERO).min(max_wait);
                match shutdown_rx.recv_timeout(wait) {
                    Ok(()) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        warn!(scheduler = name, "scheduler handle dropped, stopping");
                        break;
                    }
                }
            }
            info!(scheduler = name, "scheduler stopped");
        })?;

        Ok(WorkerHandle::new(name.to_string(), shutdown_tx, join))
    }
}
