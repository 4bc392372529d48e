//! # Periodic timer
//!
//! Runs a function on a background thread at a fixed period. Deadlines are computed from the time
//! the timer was started rather than from the previous tick, so the tick times do not drift with
//! the time spent inside the function. If a deadline is missed entirely it is skipped, not
//! replayed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{debug, error};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A running periodic timer. The timer is stopped when dropped.
pub struct PeriodicTimer {
    name: String,

    stop_sender: Option<Sender<()>>,

    join_handle: Option<JoinHandle<()>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("The timer period must be greater than zero")]
    ZeroPeriod,

    #[error("Could not spawn the timer thread: {0}")]
    SpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PeriodicTimer {
    /// Start a timer calling `tick` every `period`, the first call being one period from now.
    ///
    /// A panic inside `tick` is caught and logged, the following ticks still run.
    pub fn start<F>(name: &str, period: Duration, mut tick: F) -> Result<Self, TimerError>
    where
        F: FnMut() + Send + 'static
    {
        if period == Duration::from_secs(0) {
            return Err(TimerError::ZeroPeriod)
        }

        let (stop_sender, stop_receiver) = mpsc::channel::<()>();
        let thread_name = name.to_string();

        let join_handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let start = Instant::now();
                let mut deadline = start + period;

                loop {
                    let timeout = deadline.saturating_duration_since(Instant::now());

                    // Either a stop request or the sender being dropped ends the timer
                    match stop_receiver.recv_timeout(timeout) {
                        Err(RecvTimeoutError::Timeout) => (),
                        _ => break
                    }

                    if panic::catch_unwind(AssertUnwindSafe(&mut tick)).is_err() {
                        error!("Tick of timer \"{}\" panicked", thread_name);
                    }

                    deadline = next_deadline(start, period, Instant::now());
                }

                debug!("Timer \"{}\" stopped", thread_name);
            })
            .map_err(TimerError::SpawnError)?;

        debug!("Timer \"{}\" started with period {:?}", name, period);

        Ok(Self {
            name: name.into(),
            stop_sender: Some(stop_sender),
            join_handle: Some(join_handle),
        })
    }

    /// Stop the timer, waiting for any in-progress tick to complete.
    ///
    /// Calling this more than once has no effect.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_sender.take() {
            tx.send(()).ok();
        }

        if let Some(jh) = self.join_handle.take() {
            if jh.join().is_err() {
                error!("Thread of timer \"{}\" exited with a panic", self.name);
            }
        }
    }

    /// True if the timer has not been stopped.
    pub fn is_running(&self) -> bool {
        self.join_handle.is_some()
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// The first deadline on the `start + k * period` grid that lies after `now`.
fn next_deadline(start: Instant, period: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(start).as_nanos();
    let k = elapsed / period.as_nanos() + 1;

    start + Duration::from_nanos((period.as_nanos() * k) as u64)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
