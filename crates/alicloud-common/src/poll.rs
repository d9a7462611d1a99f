//! Bounded polling of asynchronous cloud operations
//!
//! [`wait_for_result`] re-runs a predicate until it yields a value, the
//! deadline passes, or the cancellation token fires. There is no backoff:
//! every attempt is followed by the same interval.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{Error, Result};

/// Default bound on a wait
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(900);
/// Default delay between attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// How a wait behaves
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between attempts
    pub interval: Duration,
    /// Wall-clock bound, measured from the first attempt
    pub timeout: Duration,
    /// Return the first predicate error instead of logging it and polling on
    pub return_on_error: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            return_on_error: false,
        }
    }
}

impl PollOptions {
    /// Options with the given interval and timeout that keep polling through errors
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            return_on_error: false,
        }
    }

    /// Stop at the first predicate error
    pub fn returning_on_error(mut self) -> Self {
        self.return_on_error = true;
        self
    }
}

/// Outcome of one predicate attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStep<T> {
    /// The wait is over
    Done(T),
    /// Not there yet
    Pending,
}

/// Poll `predicate` until it returns [`PollStep::Done`].
///
/// After every attempt that does not finish the wait the helper sleeps
/// `options.interval`, then gives up with [`Error::Timeout`] naming `name`
/// if the deadline has passed. Predicate errors end the wait only when
/// `options.return_on_error` is set. Cancelling `cancel` ends the wait with
/// [`Error::Cancelled`].
pub async fn wait_for_result<T, F, Fut>(
    name: &str,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut predicate: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStep<T>>>,
{
    let deadline = Instant::now() + options.timeout;

    loop {
        match predicate().await {
            Ok(PollStep::Done(value)) => return Ok(value),
            Ok(PollStep::Pending) => {
                debug!(wait = %name, "condition not met yet");
            }
            Err(e) => {
                error!(wait = %name, error = %e, "poll predicate failed");
                if options.return_on_error {
                    return Err(e);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled { operation: name.to_string() });
            }
            _ = tokio::time::sleep(options.interval) => {}
        }

        if Instant::now() >= deadline {
            return Err(Error::timeout(name));
        }
    }
}
