//! Jittered periodic tasks.
//!
//! A scheduled task runs a fallible action over and over again, sleeping
//! for a randomized fraction of a nominal interval before each run. The
//! randomization keeps many processes started at the same time from
//! hitting their disks in lockstep.
//!
//! A task ends when its stop signal, a [`watch`] channel, changes to
//! `true` or when the sending half of the channel is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Error;

/// How far the jittered delay may stray from the nominal interval.
const JITTER_BIAS: f64 = 0.5;

//------------ jitter --------------------------------------------------------

/// Returns a randomized delay around `interval`.
///
/// The delay lies between 75 and 125 percent of the interval.
pub fn jitter(interval: Duration) -> Duration {
    jitter_with(interval, rand::random::<f64>())
}

/// Returns the delay for `interval` for a sample from `[0, 1)`.
///
/// The delay is `((sample - 0.5) * 0.5 + 1) * interval`.
pub fn jitter_with(interval: Duration, sample: f64) -> Duration {
    let sample = sample.clamp(0., 1.);
    interval.mul_f64((sample - JITTER_BIAS) * JITTER_BIAS + 1.)
}

//------------ stop_signal ---------------------------------------------------

/// Creates a new stop signal for scheduled tasks.
///
/// Sending `true` or dropping the sender stops all tasks holding a clone
/// of the receiver.
pub fn stop_signal() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

//------------ spawn ---------------------------------------------------------

/// Spawns a task that runs `action` every `interval` with jitter.
///
/// Errors returned by the action are logged and the task carries on.
pub fn spawn<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    mut action: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            let delay = jitter(interval);
            trace!("{name}: next run in {delay:?}");
            tokio::select! {
                _ = tokio::time::sleep(delay) => { }
                res = stop.changed() => {
                    if res.is_err() || *stop.borrow_and_update() {
                        break;
                    }
                    continue;
                }
            }
            if let Err(err) = action().await {
                warn!("{name}: {err}");
            }
        }
        debug!("{name}: stopped");
    })
}

//============ Testing =======================================================
