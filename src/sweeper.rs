//! Background task that records lapsed holds and missed tours

use std::time::Duration;

use booking::Booking;
use common::{DbPool, Error};
use tokio::time::MissedTickBehavior;

use crate::{AppState, SharedClock};

/// Outcome of a single sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
	pub expired:  usize,
	pub no_shows: usize,
}

/// Periodically expires lapsed holds and marks confirmed bookings of past
/// dates as no-shows
///
/// Every read and write already settles lapsed holds on its own, so the
/// sweeper only keeps stored statuses close to what callers observe.
#[derive(Clone)]
pub struct Sweeper {
	pool:     DbPool,
	clock:    SharedClock,
	interval: Duration,
}

impl Sweeper {
	#[must_use]
	pub fn new(pool: DbPool, clock: SharedClock, interval: Duration) -> Self {
		Self { pool, clock, interval }
	}

	/// Build a sweeper from the app state, [`None`] if sweeping is disabled
	#[must_use]
	pub fn from_state(state: &AppState) -> Option<Self> {
		let interval = state.config.sweep_interval?;

		Some(Self::new(state.database_pool.clone(), state.clock.clone(), interval))
	}

	/// Run a single sweep at the current time
	#[instrument(skip(self))]
	pub async fn sweep_once(&self) -> Result<SweepReport, Error> {
		let now = self.clock.now();
		let conn = self.pool.get().await?;

		let expired = Booking::expire_lapsed(now, &conn).await?;
		let no_shows = Booking::mark_no_shows(now.date(), now, &conn).await?;

		Ok(SweepReport { expired, no_shows })
	}

	/// Sweep forever at the configured interval
	pub async fn run(self) {
		info!("sweeping bookings every {:?}", self.interval);

		let mut interval = tokio::time::interval(self.interval);
		interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			interval.tick().await;

			if let Err(e) = self.sweep_once().await {
				error!("booking sweep failed -- {e:?}");
			}
		}
	}
}
