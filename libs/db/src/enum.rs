use std::fmt;
use std::str::FromStr;

use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a booking
///
/// The legal moves between these states live in the `lifecycle` crate, this
/// type only knows how to be stored and (de)serialized.
#[derive(
	Clone,
	Copy,
	DbEnum,
	Debug,
	Default,
	Deserialize,
	PartialEq,
	Eq,
	Hash,
	Serialize,
)]
#[ExistingTypePath = "crate::sql_types::BookingStatus"]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
	#[default]
	SlotReserved,
	SlotExpired,
	AwaitingPayment,
	PaymentFailed,
	Paid,
	Confirmed,
	Cancelled,
	RefundPending,
	Refunded,
	RefundFailed,
	CheckedIn,
	NoShow,
	Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown booking status '{0}'")]
pub struct UnknownBookingStatus(pub String);

impl BookingStatus {
	pub const ALL: [Self; 13] = [
		Self::SlotReserved,
		Self::SlotExpired,
		Self::AwaitingPayment,
		Self::PaymentFailed,
		Self::Paid,
		Self::Confirmed,
		Self::Cancelled,
		Self::RefundPending,
		Self::Refunded,
		Self::RefundFailed,
		Self::CheckedIn,
		Self::NoShow,
		Self::Completed,
	];

	/// The database and wire representation of this status
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::SlotReserved => "slot_reserved",
			Self::SlotExpired => "slot_expired",
			Self::AwaitingPayment => "awaiting_payment",
			Self::PaymentFailed => "payment_failed",
			Self::Paid => "paid",
			Self::Confirmed => "confirmed",
			Self::Cancelled => "cancelled",
			Self::RefundPending => "refund_pending",
			Self::Refunded => "refunded",
			Self::RefundFailed => "refund_failed",
			Self::CheckedIn => "checked_in",
			Self::NoShow => "no_show",
			Self::Completed => "completed",
		}
	}

	/// Whether a booking in this status still takes up a place in its slot
	///
	/// A `SlotReserved` booking only counts while its hold has not lapsed,
	/// callers need to check that separately.
	#[must_use]
	pub fn occupies_capacity(self) -> bool {
		!matches!(
			self,
			Self::Cancelled
				| Self::SlotExpired
				| Self::RefundPending
				| Self::Refunded
				| Self::RefundFailed
		)
	}

	/// Statuses that never occupy capacity
	#[must_use]
	pub fn released() -> [Self; 5] {
		[
			Self::Cancelled,
			Self::SlotExpired,
			Self::RefundPending,
			Self::Refunded,
			Self::RefundFailed,
		]
	}
}

impl fmt::Display for BookingStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for BookingStatus {
	type Err = UnknownBookingStatus;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| UnknownBookingStatus(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use diesel::pg::Pg;
	use diesel::prelude::*;

	use super::*;
	use crate::booking;

	#[test]
	fn status_filters_build() {
		let query = booking::table
			.filter(booking::status.ne_all(BookingStatus::released()))
			.filter(booking::status.eq(BookingStatus::AwaitingPayment))
			.select(booking::id);

		let sql = diesel::debug_query::<Pg, _>(&query).to_string();

		assert!(sql.contains("\"booking\".\"status\" != ALL("));
		assert!(sql.contains("\"booking\".\"status\" = $"));
	}

	#[test]
	fn released_statuses_free_capacity() {
		for status in BookingStatus::ALL {
			assert_eq!(
				BookingStatus::released().contains(&status),
				!status.occupies_capacity(),
				"{status}"
			);
			assert_eq!(status.as_str().parse::<BookingStatus>(), Ok(status));
		}

		assert_eq!(
			"pending".parse::<BookingStatus>(),
			Err(UnknownBookingStatus("pending".to_string()))
		);
	}
}
