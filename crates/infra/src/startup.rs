//! Startup dependency handling.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{dependency} unavailable after {attempts} attempts: {last_error}")]
    DependencyUnavailable {
        dependency: &'static str,
        attempts: u32,
        last_error: String,
    },
}

/// Call `connect` until it succeeds, at most `attempts` times, sleeping `delay`
/// between tries.
///
/// On exhaustion the caller is expected to exit the process and let the
/// orchestrator restart it.
pub fn connect_with_retry<T, E>(
    dependency: &'static str,
    attempts: u32,
    delay: Duration,
    mut connect: impl FnMut() -> Result<T, E>,
) -> Result<T, StartupError>
where
    E: core::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match connect() {
            Ok(conn) => {
                info!(dependency, attempt, "dependency connected");
                return Ok(conn);
            }
            Err(err) => {
                last_error = err.to_string();
                warn!(dependency, attempt, attempts, error = %last_error, "dependency unavailable");
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }

    Err(StartupError::DependencyUnavailable {
        dependency,
        attempts,
        last_error,
    })
}
