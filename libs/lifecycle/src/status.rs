use chrono::NaiveDateTime;
use db::BookingStatus;

use crate::{BookingView, InvalidState, effective_status, hold_lapsed};

/// Who asks for a status change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
	/// Timers and sweeps, no user involved
	System,
	/// The profile that made the booking
	Owner,
	/// An administrator acting on someone's booking
	Admin,
}

/// A checked status change
///
/// Persistence code can only change `status` and `expires_at` by applying a
/// [`Transition`], and these can only be built by the rules in this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct Transition {
	from:       BookingStatus,
	to:         BookingStatus,
	expires_at: Option<NaiveDateTime>,
}

impl Transition {
	pub(crate) fn new(
		from: BookingStatus,
		to: BookingStatus,
		expires_at: Option<NaiveDateTime>,
	) -> Self {
		Self { from, to, expires_at }
	}

	/// The stored status this transition starts from
	pub fn from_status(&self) -> BookingStatus { self.from }

	pub fn to_status(&self) -> BookingStatus { self.to }

	/// The hold expiry to store alongside the new status
	pub fn expires_at(&self) -> Option<NaiveDateTime> { self.expires_at }
}

#[derive(Clone, Copy, Debug)]
enum Guard {
	Always,
	/// The hold of a reserved slot has lapsed
	HoldLapsed,
	/// The hold of a reserved slot is still running
	HoldRunning,
	/// Today is the day of the tour
	OnBookingDate,
	/// The day of the tour has started
	FromBookingDate,
	/// The day of the tour is over
	AfterBookingDate,
}

impl Guard {
	fn holds<B>(self, booking: &B, now: NaiveDateTime) -> bool
	where
		B: BookingView + ?Sized,
	{
		match self {
			Self::Always => true,
			Self::HoldLapsed => hold_lapsed(booking, now),
			Self::HoldRunning => !hold_lapsed(booking, now),
			Self::OnBookingDate => now.date() == booking.date(),
			Self::FromBookingDate => now.date() >= booking.date(),
			Self::AfterBookingDate => now.date() > booking.date(),
		}
	}
}

struct Edge {
	from:   BookingStatus,
	to:     BookingStatus,
	actors: &'static [Actor],
	guard:  Guard,
}

const fn edge(
	from: BookingStatus,
	to: BookingStatus,
	actors: &'static [Actor],
	guard: Guard,
) -> Edge {
	Edge { from, to, actors, guard }
}

const SYSTEM: &[Actor] = &[Actor::System];
const OWNER: &[Actor] = &[Actor::Owner];
const ADMIN: &[Actor] = &[Actor::Admin];
const OWNER_OR_ADMIN: &[Actor] = &[Actor::Owner, Actor::Admin];
const ADMIN_OR_SYSTEM: &[Actor] = &[Actor::Admin, Actor::System];

type S = BookingStatus;

#[rustfmt::skip]
const EDGES: &[Edge] = &[
	edge(S::SlotReserved, S::SlotExpired, SYSTEM, Guard::HoldLapsed),
	edge(S::SlotReserved, S::AwaitingPayment, OWNER, Guard::HoldRunning),
	edge(S::SlotReserved, S::Cancelled, OWNER_OR_ADMIN, Guard::HoldRunning),
	edge(S::AwaitingPayment, S::Cancelled, OWNER_OR_ADMIN, Guard::Always),
	edge(S::AwaitingPayment, S::Paid, ADMIN_OR_SYSTEM, Guard::Always),
	edge(S::AwaitingPayment, S::PaymentFailed, ADMIN_OR_SYSTEM, Guard::Always),
	edge(S::PaymentFailed, S::AwaitingPayment, OWNER, Guard::Always),
	edge(S::PaymentFailed, S::Cancelled, OWNER_OR_ADMIN, Guard::Always),
	edge(S::Paid, S::Confirmed, ADMIN_OR_SYSTEM, Guard::Always),
	edge(S::Paid, S::Cancelled, OWNER_OR_ADMIN, Guard::Always),
	edge(S::Paid, S::RefundPending, OWNER_OR_ADMIN, Guard::Always),
	edge(S::Confirmed, S::Cancelled, OWNER_OR_ADMIN, Guard::Always),
	edge(S::Confirmed, S::RefundPending, OWNER_OR_ADMIN, Guard::Always),
	edge(S::Confirmed, S::CheckedIn, ADMIN, Guard::OnBookingDate),
	edge(S::Confirmed, S::NoShow, ADMIN, Guard::FromBookingDate),
	edge(S::Confirmed, S::NoShow, SYSTEM, Guard::AfterBookingDate),
	edge(S::CheckedIn, S::Completed, ADMIN_OR_SYSTEM, Guard::Always),
	edge(S::RefundPending, S::Refunded, ADMIN, Guard::Always),
	edge(S::RefundPending, S::RefundFailed, ADMIN, Guard::Always),
];

/// Check whether `actor` may move `booking` to `requested` at `now`
///
/// A lapsed hold is treated as [`BookingStatus::SlotExpired`] for every
/// request except the expiry itself. Every status change clears the hold
/// expiry, only [`BookingStatus::SlotReserved`] bookings carry one.
///
/// # Errors
/// Fails if no edge of the lifecycle graph connects the current and the
/// requested status for this actor, or if the guard of that edge fails
pub fn transition<B: BookingView + ?Sized>(
	booking: &B,
	requested: BookingStatus,
	actor: Actor,
	now: NaiveDateTime,
) -> Result<Transition, InvalidState> {
	let stored = booking.status();
	let current = effective_status(booking, now);

	let from =
		if requested == BookingStatus::SlotExpired { stored } else { current };

	let permitted = EDGES.iter().any(|e| {
		e.from == from
			&& e.to == requested
			&& e.actors.contains(&actor)
			&& e.guard.holds(booking, now)
	});

	if !permitted {
		return Err(InvalidState { current, requested });
	}

	Ok(Transition::new(stored, requested, None))
}

/// Whether a booking in `status` can never change again
#[must_use]
pub fn is_terminal(status: BookingStatus) -> bool {
	!EDGES.iter().any(|e| e.from == status)
}
