use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time
pub trait Clock: Send + Sync {
	fn now(&self) -> NaiveDateTime;

	/// The current UTC calendar date
	fn today(&self) -> NaiveDate { self.now().date() }
}

/// The wall clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> NaiveDateTime { Utc::now().naive_utc() }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
	time: Mutex<NaiveDateTime>,
}

impl ManualClock {
	#[must_use]
	pub fn new(time: NaiveDateTime) -> Self { Self { time: Mutex::new(time) } }

	/// Move the clock forward by `delta`
	pub fn advance(&self, delta: TimeDelta) {
		let mut time = self.time.lock();
		*time += delta;
	}

	pub fn set(&self, time: NaiveDateTime) { *self.time.lock() = time; }
}

impl Clock for ManualClock {
	fn now(&self) -> NaiveDateTime { *self.time.lock() }
}
