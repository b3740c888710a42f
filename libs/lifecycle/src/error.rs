use chrono::NaiveDate;
use db::BookingStatus;
use thiserror::Error;

/// A booking cannot move from `current` to `requested`
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("cannot move booking from {current} to {requested}")]
pub struct InvalidState {
	pub current:   BookingStatus,
	pub requested: BookingStatus,
}

/// Malformed reservation input
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InputError {
	#[error("group size must be between 1 and 50, got {0}")]
	GroupSize(i32),
	#[error("unknown time slot '{0}'")]
	UnknownTimeSlot(String),
	#[error("{0} lies in the past and can no longer be reserved")]
	DateInPast(NaiveDate),
	#[error("a hold can be extended by 1 to 60 minutes, got {0}")]
	Extension(i64),
}

/// A reservation would break the capacity or ownership rules of a slot
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ReservationConflict {
	#[error("the profile already holds this slot")]
	AlreadyHeld,
	#[error("slot '{slot}' on {date} has no places left out of {capacity}")]
	Full { date: NaiveDate, slot: String, capacity: u32 },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
	#[error(transparent)]
	InvalidState(#[from] InvalidState),
	#[error(transparent)]
	Input(#[from] InputError),
	#[error(transparent)]
	Conflict(#[from] ReservationConflict),
}
