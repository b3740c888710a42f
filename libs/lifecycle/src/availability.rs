use chrono::{NaiveDate, NaiveDateTime};
use db::BookingStatus;

use crate::{
	BookingView,
	ReservationConflict,
	SlotCatalogue,
	effective_status,
	occupies_slot,
};

/// Bookings in `slot` on `date` that still take up a place at `now`
fn occupants<'b, B: BookingView>(
	date: NaiveDate,
	slot: &'b str,
	bookings: &'b [B],
	now: NaiveDateTime,
) -> impl Iterator<Item = &'b B> {
	bookings.iter().filter(move |b| {
		b.date() == date && b.time_slot() == slot && occupies_slot(*b, now)
	})
}

/// Remaining capacity of a single slot, as seen by one viewer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotAvailability {
	pub slot:                String,
	pub capacity:            u32,
	pub available:           u32,
	pub user_has_booking:    bool,
	pub user_booking_status: Option<BookingStatus>,
	/// Whether the viewer can pick this slot, either to reserve it or to
	/// carry on with a booking they already hold
	pub selectable:          bool,
}

/// Counts the places left in each slot of a day
#[derive(Clone, Copy, Debug)]
pub struct AvailabilityCalculator<'a> {
	catalogue: &'a SlotCatalogue,
	capacity:  u32,
}

impl<'a> AvailabilityCalculator<'a> {
	#[must_use]
	pub fn new(catalogue: &'a SlotCatalogue, capacity: u32) -> Self {
		Self { catalogue, capacity }
	}

	/// Availability of every slot in the catalogue on `date`
	///
	/// `bookings` may contain bookings of other dates and bookings that no
	/// longer occupy a place, both are ignored. Holds that lapsed before
	/// `now` are not counted even when they were never marked as expired.
	pub fn for_date<B: BookingView>(
		&self,
		date: NaiveDate,
		bookings: &[B],
		viewer: Option<i32>,
		now: NaiveDateTime,
	) -> Vec<SlotAvailability> {
		let past = date < now.date();

		self.catalogue
			.iter()
			.map(|slot| {
				let mut taken: u32 = 0;
				let mut own = None;

				for booking in occupants(date, slot, bookings, now) {
					taken += 1;

					if Some(booking.owner()) == viewer {
						own = Some(effective_status(booking, now));
					}
				}

				let available = self.capacity.saturating_sub(taken);

				SlotAvailability {
					slot: slot.to_string(),
					capacity: self.capacity,
					available,
					user_has_booking: own.is_some(),
					user_booking_status: own,
					selectable: !past && (available > 0 || own.is_some()),
				}
			})
			.collect()
	}
}

/// Check whether `owner` can take another place in `slot` on `date`, given
/// the bookings already made for that slot
///
/// # Errors
/// Fails if `owner` already occupies the slot, or if it is full
pub fn check_reservation<B: BookingView>(
	capacity: u32,
	date: NaiveDate,
	slot: &str,
	owner: i32,
	bookings: &[B],
	now: NaiveDateTime,
) -> Result<(), ReservationConflict> {
	let mut taken: u32 = 0;

	for booking in occupants(date, slot, bookings, now) {
		if booking.owner() == owner {
			return Err(ReservationConflict::AlreadyHeld);
		}

		taken += 1;
	}

	if taken >= capacity {
		return Err(ReservationConflict::Full {
			date,
			slot: slot.to_string(),
			capacity,
		});
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use chrono::TimeDelta;

	use super::*;
	use crate::tests::TestBooking;

	const SLOT: &str = "09:00 - 10:00";

	fn catalogue() -> SlotCatalogue {
		SlotCatalogue::new([SLOT, "10:00 - 11:00"])
	}

	#[test]
	fn counts_only_occupying_bookings() {
		let catalogue = catalogue();
		let calc = AvailabilityCalculator::new(&catalogue, 4);

		let reserved = TestBooking::reserved();
		let now = reserved.reserved_at + TimeDelta::minutes(1);
		let bookings = vec![
			reserved.clone().owned_by(1),
			TestBooking::with_status(BookingStatus::Confirmed).owned_by(2),
			TestBooking::with_status(BookingStatus::Cancelled).owned_by(3),
			TestBooking::with_status(BookingStatus::SlotExpired).owned_by(4),
			TestBooking::with_status(BookingStatus::Refunded).owned_by(5),
			TestBooking::with_status(BookingStatus::Paid)
				.owned_by(6)
				.in_slot("10:00 - 11:00"),
		];

		let slots = calc.for_date(reserved.date, &bookings, None, now);

		assert_eq!(slots.len(), 2);
		assert_eq!(slots[0].slot, SLOT);
		assert_eq!(slots[0].available, 2);
		assert_eq!(slots[1].available, 3);
		assert!(slots.iter().all(|s| !s.user_has_booking));
	}

	#[test]
	fn lapsed_hold_restores_capacity() {
		let catalogue = catalogue();
		let calc = AvailabilityCalculator::new(&catalogue, 1);

		let reserved = TestBooking::reserved().owned_by(1);
		let bookings = vec![reserved.clone()];

		let during = reserved.reserved_at + TimeDelta::minutes(14);
		let slots = calc.for_date(reserved.date, &bookings, None, during);
		assert_eq!(slots[0].available, 0);

		let after = reserved.reserved_at + TimeDelta::minutes(16);
		let slots = calc.for_date(reserved.date, &bookings, None, after);
		assert_eq!(slots[0].available, 1);
	}

	#[test]
	fn own_hold_stays_selectable_when_full() {
		let catalogue = catalogue();
		let calc = AvailabilityCalculator::new(&catalogue, 1);

		let reserved = TestBooking::reserved().owned_by(7);
		let now = reserved.reserved_at;
		let bookings = vec![reserved.clone()];

		let mine = &calc.for_date(reserved.date, &bookings, Some(7), now)[0];
		assert_eq!(mine.available, 0);
		assert!(mine.user_has_booking);
		assert_eq!(mine.user_booking_status, Some(BookingStatus::SlotReserved));
		assert!(mine.selectable);

		let theirs = &calc.for_date(reserved.date, &bookings, Some(8), now)[0];
		assert_eq!(theirs.available, 0);
		assert!(!theirs.user_has_booking);
		assert!(!theirs.selectable);
	}

	#[test]
	fn past_dates_report_capacity_but_are_not_selectable() {
		let catalogue = catalogue();
		let calc = AvailabilityCalculator::new(&catalogue, 3);

		let booking = TestBooking::with_status(BookingStatus::Completed);
		let now = booking.reserved_at + TimeDelta::days(5);

		let slots = calc.for_date(booking.date, &[booking], None, now);

		assert_eq!(slots[0].available, 2);
		assert!(slots.iter().all(|s| !s.selectable));
	}

	#[test]
	fn reservation_checks() {
		let first = TestBooking::reserved().owned_by(1);
		let now = first.reserved_at;
		let date = first.date;
		let mut bookings = vec![first];

		assert_eq!(
			check_reservation(2, date, SLOT, 1, &bookings, now),
			Err(ReservationConflict::AlreadyHeld)
		);
		assert_eq!(check_reservation(2, date, SLOT, 2, &bookings, now), Ok(()));

		bookings.push(TestBooking::reserved().owned_by(2));

		assert_eq!(
			check_reservation(2, date, SLOT, 3, &bookings, now),
			Err(ReservationConflict::Full {
				date,
				slot: SLOT.to_string(),
				capacity: 2,
			})
		);
	}

	#[test]
	fn available_never_underflows() {
		let catalogue = catalogue();
		let calc = AvailabilityCalculator::new(&catalogue, 1);

		let bookings = vec![
			TestBooking::with_status(BookingStatus::Confirmed).owned_by(1),
			TestBooking::with_status(BookingStatus::Paid).owned_by(2),
		];
		let now = bookings[0].reserved_at;

		let slots = calc.for_date(bookings[0].date, &bookings, None, now);

		assert_eq!(slots[0].available, 0);
	}
}
