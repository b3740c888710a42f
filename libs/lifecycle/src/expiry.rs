use chrono::{NaiveDateTime, TimeDelta};
use db::BookingStatus;

use crate::{
	Actor,
	BookingView,
	InputError,
	InvalidState,
	LifecycleError,
	Transition,
	transition,
};

pub const DEFAULT_HOLD_MINUTES: i64 = 15;
pub const MAX_HOLD_EXTENSION_MINUTES: i64 = 60;

/// Whether the soft hold of a reserved booking ran out
///
/// Only a [`BookingStatus::SlotReserved`] booking can have a lapsed hold.
pub fn hold_lapsed<B>(booking: &B, now: NaiveDateTime) -> bool
where
	B: BookingView + ?Sized,
{
	booking.status() == BookingStatus::SlotReserved
		&& booking.expires_at().is_some_and(|expires_at| now > expires_at)
}

/// Whether a booking no longer holds its slot because its hold expired,
/// either recorded or not yet persisted
pub fn is_expired<B>(booking: &B, now: NaiveDateTime) -> bool
where
	B: BookingView + ?Sized,
{
	booking.status() == BookingStatus::SlotExpired || hold_lapsed(booking, now)
}

/// The status a caller should observe, with lapsed holds shown as expired
pub fn effective_status<B>(booking: &B, now: NaiveDateTime) -> BookingStatus
where
	B: BookingView + ?Sized,
{
	if hold_lapsed(booking, now) {
		BookingStatus::SlotExpired
	} else {
		booking.status()
	}
}

/// Whether a booking currently takes up a place in its slot
pub fn occupies_slot<B>(booking: &B, now: NaiveDateTime) -> bool
where
	B: BookingView + ?Sized,
{
	effective_status(booking, now).occupies_capacity()
}

/// The expiry transition for a booking whose hold lapsed, if any
pub fn settle<B>(booking: &B, now: NaiveDateTime) -> Option<Transition>
where
	B: BookingView + ?Sized,
{
	if !hold_lapsed(booking, now) {
		return None;
	}

	transition(booking, BookingStatus::SlotExpired, Actor::System, now).ok()
}

/// A freshly opened soft hold on a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Hold {
	expires_at: NaiveDateTime,
}

impl Hold {
	/// The status of a booking created from this hold
	pub fn status(&self) -> BookingStatus { BookingStatus::SlotReserved }

	pub fn expires_at(&self) -> NaiveDateTime { self.expires_at }
}

/// How long reservations stay on hold before they lapse
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpiryPolicy {
	hold_window: TimeDelta,
}

impl Default for ExpiryPolicy {
	fn default() -> Self {
		Self { hold_window: TimeDelta::minutes(DEFAULT_HOLD_MINUTES) }
	}
}

impl ExpiryPolicy {
	#[must_use]
	pub fn new(hold_window: TimeDelta) -> Self { Self { hold_window } }

	#[must_use]
	pub fn hold_window(&self) -> TimeDelta { self.hold_window }

	/// Open a new hold starting at `now`
	pub fn open_hold(&self, now: NaiveDateTime) -> Hold {
		Hold { expires_at: now + self.hold_window }
	}

	/// Push the expiry of a running hold back by `minutes`
	///
	/// # Errors
	/// Fails if `minutes` is out of range or the booking has no running hold
	pub fn extend<B>(
		&self,
		booking: &B,
		minutes: i64,
		now: NaiveDateTime,
	) -> Result<Transition, LifecycleError>
	where
		B: BookingView + ?Sized,
	{
		if !(1..=MAX_HOLD_EXTENSION_MINUTES).contains(&minutes) {
			return Err(InputError::Extension(minutes).into());
		}

		let current = effective_status(booking, now);

		if current != BookingStatus::SlotReserved {
			return Err(InvalidState {
				current,
				requested: BookingStatus::SlotReserved,
			}
			.into());
		}

		let base = booking.expires_at().unwrap_or(now);
		let expires_at = base + TimeDelta::minutes(minutes);

		Ok(Transition::new(
			BookingStatus::SlotReserved,
			BookingStatus::SlotReserved,
			Some(expires_at),
		))
	}
}
