//! Cancellable deferred values with a bounded-wait accessor.
//!
//! A pasted fragment's description is produced in the background (usually
//! by summarizing the paste). Readers either peek at the current state or
//! wait for at most a fixed duration; nobody ever blocks indefinitely.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a deferred value is unavailable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeferredError {
    /// The wait bound elapsed while the value was still pending.
    #[error("timed out waiting for deferred value")]
    TimedOut,

    /// The computation finished without a value.
    #[error("deferred computation failed: {0}")]
    Failed(String),

    /// The computation was cancelled.
    #[error("deferred computation cancelled")]
    Cancelled,
}

#[derive(Debug)]
enum State<T> {
    Pending,
    Ready(T),
    Failed(String),
    Cancelled,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    done: Condvar,
}

impl<T> Shared<T> {
    /// Moves out of `Pending`; later settlements are ignored.
    fn settle(&self, next: State<T>) -> bool {
        let mut state = self.state.lock();
        if !matches!(*state, State::Pending) {
            return false;
        }
        *state = next;
        self.done.notify_all();
        true
    }
}

/// A value that may not be available yet.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Write side of a pending [`Deferred`].
///
/// Dropping it without completing fails the deferred value, so waiters are
/// always released.
pub struct Completer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, value: T) {
        self.shared.settle(State::Ready(value));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.shared.settle(State::Failed(reason.into()));
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.shared
            .settle(State::Failed("computation abandoned".to_string()));
    }
}

impl<T: Clone> Deferred<T> {
    /// A pending value and the handle that settles it.
    pub fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Completer { shared },
        )
    }

    /// An already available value.
    pub fn ready(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Ready(value)),
                done: Condvar::new(),
            }),
        }
    }

    /// Runs `compute` on a new thread.
    pub fn spawn<F>(compute: F) -> Self
    where
        T: Send + 'static,
        F: FnOnce() -> std::result::Result<T, String> + Send + 'static,
    {
        let (deferred, completer) = Self::pending();
        thread::spawn(move || match compute() {
            Ok(value) => completer.complete(value),
            Err(reason) => completer.fail(reason),
        });
        deferred
    }

    /// True once the value is settled, whether successfully or not.
    pub fn is_done(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending)
    }

    /// The current outcome without waiting; `None` while pending.
    pub fn try_get(&self) -> Option<std::result::Result<T, DeferredError>> {
        Self::outcome(&self.shared.state.lock())
    }

    /// Waits at most `timeout` for the value.
    pub fn get_timeout(&self, timeout: Duration) -> std::result::Result<T, DeferredError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = Self::outcome(&state) {
                return outcome;
            }
            if self.shared.done.wait_until(&mut state, deadline).timed_out() {
                return Self::outcome(&state).unwrap_or(Err(DeferredError::TimedOut));
            }
        }
    }

    /// Cancels a pending computation. Returns false if it had already settled.
    pub fn cancel(&self) -> bool {
        self.shared.settle(State::Cancelled)
    }

    fn outcome(state: &State<T>) -> Option<std::result::Result<T, DeferredError>> {
        match state {
            State::Pending => None,
            State::Ready(value) => Some(Ok(value.clone())),
            State::Failed(reason) => Some(Err(DeferredError::Failed(reason.clone()))),
            State::Cancelled => Some(Err(DeferredError::Cancelled)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred({:?})", *self.shared.state.lock())
    }
}
