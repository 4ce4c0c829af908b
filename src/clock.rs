use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

/// Source of the current instant and of the local calendar day.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock. Clones share the same instant, so a test can keep one
/// handle and advance time under a store that owns the other.
///
/// `today` is the UTC calendar day of the current instant, which keeps day
/// rollover tests independent of the host timezone.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}
