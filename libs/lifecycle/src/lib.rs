//! Rules for the life of a tour booking
//!
//! Everything in here is pure: callers hand in the current time through a
//! [`Clock`] and the bookings they loaded, and get back decisions. The model
//! crates are responsible for persisting those decisions.

mod availability;
mod clock;
mod error;
mod expiry;
mod slot;
mod status;

pub use availability::*;
pub use clock::*;
pub use error::*;
pub use expiry::*;
pub use slot::*;
pub use status::*;

use chrono::{NaiveDate, NaiveDateTime};
use db::BookingStatus;

/// Read access to the parts of a booking the lifecycle rules care about
pub trait BookingView {
	/// Id of the owning profile
	fn owner(&self) -> i32;
	fn date(&self) -> NaiveDate;
	fn time_slot(&self) -> &str;
	fn status(&self) -> BookingStatus;
	fn expires_at(&self) -> Option<NaiveDateTime>;
}

#[cfg(test)]
pub(crate) mod tests {
	use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
	use db::BookingStatus;

	use crate::BookingView;

	#[derive(Clone, Debug)]
	pub(crate) struct TestBooking {
		pub(crate) owner:       i32,
		pub(crate) date:        NaiveDate,
		pub(crate) time_slot:   String,
		pub(crate) status:      BookingStatus,
		pub(crate) expires_at:  Option<NaiveDateTime>,
		pub(crate) reserved_at: NaiveDateTime,
	}

	impl TestBooking {
		/// A fresh hold on 2025-03-20 09:00, reserved the evening before
		pub(crate) fn reserved() -> Self {
			let reserved_at = NaiveDate::from_ymd_opt(2025, 3, 19)
				.unwrap()
				.and_hms_opt(18, 0, 0)
				.unwrap();

			Self {
				owner: 1,
				date: NaiveDate::from_ymd_opt(2025, 3, 20).unwrap(),
				time_slot: "09:00 - 10:00".to_string(),
				status: BookingStatus::SlotReserved,
				expires_at: Some(reserved_at + TimeDelta::minutes(15)),
				reserved_at,
			}
		}

		pub(crate) fn with_status(status: BookingStatus) -> Self {
			let reserved = Self::reserved();

			if status == BookingStatus::SlotReserved {
				return reserved;
			}

			Self { status, expires_at: None, ..reserved }
		}

		pub(crate) fn owned_by(self, owner: i32) -> Self { Self { owner, ..self } }

		pub(crate) fn in_slot(self, slot: &str) -> Self {
			Self { time_slot: slot.to_string(), ..self }
		}
	}

	impl BookingView for TestBooking {
		fn owner(&self) -> i32 { self.owner }

		fn date(&self) -> NaiveDate { self.date }

		fn time_slot(&self) -> &str { &self.time_slot }

		fn status(&self) -> BookingStatus { self.status }

		fn expires_at(&self) -> Option<NaiveDateTime> { self.expires_at }
	}
}
