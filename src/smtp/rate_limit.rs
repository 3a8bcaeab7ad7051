use log::{info, warn};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

pub const HOUR: Duration = Duration::from_secs(3600);

/// Shared flag a supervisor can flip to abort a batch, waking any pending pause.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    /// Clears the flag so the next batch can run. Clones see the reset too.
    pub fn reset(&self) {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for `timeout` unless cancelled first. Returns true when cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("delivery cancelled")]
pub struct Cancelled;

/// Windowed send counter owned by one delivery batch.
///
/// Once `max_per_window` sends have been recorded the limiter blocks for one
/// window and starts counting again from zero.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: Option<u32>,
    window: Duration,
    sent_in_window: u32,
    pauses: u32,
    cancel: CancelToken,
}

impl RateLimiter {
    pub fn new(max_per_window: Option<u32>, window: Duration, cancel: CancelToken) -> Self {
        Self {
            max_per_window: max_per_window.filter(|m| *m > 0),
            window,
            sent_in_window: 0,
            pauses: 0,
            cancel,
        }
    }

    pub fn hourly(max_per_hour: Option<u32>, cancel: CancelToken) -> Self {
        Self::new(max_per_hour, HOUR, cancel)
    }

    pub fn unlimited() -> Self {
        Self::new(None, HOUR, CancelToken::new())
    }

    /// Number of pauses taken so far.
    pub fn pauses(&self) -> u32 {
        self.pauses
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Counts one successful send and pauses when the window is full.
    pub fn record_send(&mut self) -> Result<(), Cancelled> {
        let Some(max) = self.max_per_window else {
            return Ok(());
        };
        self.sent_in_window += 1;
        if self.sent_in_window < max {
            return Ok(());
        }

        warn!(
            "rate limit of {max} emails reached, pausing for {}s",
            self.window.as_secs()
        );
        self.pauses += 1;
        self.sent_in_window = 0;
        if self.cancel.wait(self.window) {
            info!("delivery cancelled during rate-limit pause");
            return Err(Cancelled);
        }
        Ok(())
    }
}
