//! Wait-with-deadline primitive shared by every suspension point.
//!
//! Callers hold a `watch` receiver and a deadline; [`until`] resolves on the
//! earlier of "the watched value satisfies the predicate" or "the deadline
//! passed", and always hands back the latest value it saw.

use tokio::sync::watch;
use tokio::time::Instant;

/// How a deadline-bounded wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waited<T> {
    /// The predicate held.
    Ready(T),
    /// The deadline passed first.
    TimedOut(T),
    /// The sender is gone; no further change can arrive.
    Closed(T),
}

impl<T> Waited<T> {
    /// The value observed when the wait ended.
    pub fn into_inner(self) -> T {
        match self {
            Self::Ready(value) | Self::TimedOut(value) | Self::Closed(value) => value,
        }
    }
}

/// Wait until `ready` holds for the watched value or `deadline` passes.
pub async fn until<T, F>(rx: &mut watch::Receiver<T>, deadline: Instant, ready: F) -> Waited<T>
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let ready_value = match tokio::time::timeout_at(deadline, rx.wait_for(ready)).await {
        Ok(Ok(value)) => Ok((*value).clone()),
        Ok(Err(_closed)) => Err(true),
        Err(_elapsed) => Err(false),
    };

    match ready_value {
        Ok(value) => Waited::Ready(value),
        Err(true) => Waited::Closed(rx.borrow().clone()),
        Err(false) => Waited::TimedOut(rx.borrow().clone()),
    }
}

/// The earlier of `deadline` and `now + window`.
#[must_use]
pub fn clamp(deadline: Instant, window: std::time::Duration) -> Instant {
    deadline.min(Instant::now() + window)
}
