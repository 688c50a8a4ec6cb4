//! Bounded-time calls.
//!
//! Tool, collaborator and batch-budget calls run on a named helper thread and
//! the caller waits on a one-slot channel with `recv_timeout`. A call that
//! overruns is detached: its thread keeps running to completion, but its
//! result is dropped with the channel.

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};

/// Why a bounded call produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The deadline passed first.
    TimedOut {
        /// The deadline in milliseconds.
        duration_ms: u64,
    },
    /// The callee panicked.
    Panicked,
    /// The helper thread could not be started.
    Spawn {
        /// OS error text.
        reason: String,
    },
}

/// Converts a duration to whole milliseconds, saturating.
#[must_use]
pub fn millis(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Run `f`, waiting at most `limit`. `None` runs `f` inline without a
/// deadline; a panic is still caught and reported.
///
/// # Errors
///
/// Returns `CallError::TimedOut` when the deadline passes, `Panicked` when
/// the callee panics and `Spawn` when no helper thread could be started.
pub fn call_with_timeout<T, F>(name: &str, limit: Option<Duration>, f: F) -> Result<T, CallError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Some(limit) = limit else {
        return panic::catch_unwind(AssertUnwindSafe(f)).map_err(|_| CallError::Panicked);
    };

    let (tx, rx) = bounded::<T>(1);
    thread::Builder::new()
        .name(format!("stepwise-{name}"))
        .spawn(move || {
            let value = f();
            // The receiver is gone if the caller already timed out.
            let _ = tx.send(value);
        })
        .map_err(|err| CallError::Spawn {
            reason: err.to_string(),
        })?;

    rx.recv_timeout(limit).map_err(|err| match err {
        RecvTimeoutError::Timeout => CallError::TimedOut {
            duration_ms: millis(limit),
        },
        // The sender was dropped without sending: the closure unwound.
        RecvTimeoutError::Disconnected => CallError::Panicked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_call_returns_value() {
        let got = call_with_timeout("test", Some(Duration::from_secs(1)), || 7);
        assert_eq!(got, Ok(7));
    }

    #[test]
    fn unbounded_call_runs_inline() {
        let got = call_with_timeout("test", None, || "inline");
        assert_eq!(got, Ok("inline"));
    }

    #[test]
    fn slow_call_times_out() {
        let got = call_with_timeout("test", Some(Duration::from_millis(20)), || {
            thread::sleep(Duration::from_millis(500));
            1
        });
        assert_eq!(got, Err(CallError::TimedOut { duration_ms: 20 }));
    }

    #[test]
    fn panic_is_reported() {
        let got: Result<(), _> = call_with_timeout("test", Some(Duration::from_secs(1)), || panic!("boom"));
        assert_eq!(got, Err(CallError::Panicked));
    }
}
