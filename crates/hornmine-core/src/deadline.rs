//! Wall-clock budgets and partial results

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// An absolute point in time after which work must stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        // Budgets past the clock's range saturate to a year
        Self(
            now.checked_add(budget)
                .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 3600)),
        )
    }

    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left, zero once expired
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// The earlier of two deadlines
    pub fn min(self, other: Deadline) -> Deadline {
        if other.0 < self.0 {
            other
        } else {
            self
        }
    }
}

/// A value computed under a deadline.
///
/// `complete` is false when the deadline cut the computation short; the
/// value is then the best partial result gathered so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounded<T> {
    pub value: T,
    pub complete: bool,
}

impl<T> Bounded<T> {
    pub fn complete(value: T) -> Self {
        Self {
            value,
            complete: true,
        }
    }

    pub fn partial(value: T) -> Self {
        Self {
            value,
            complete: false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Bounded<U> {
        Bounded {
            value: f(self.value),
            complete: self.complete,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Default> Bounded<T> {
    /// Empty partial result, for work that never started
    pub fn expired() -> Self {
        Self::partial(T::default())
    }
}
