//! Library-wide error types and [`From`] impls

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;
use db::{BookingStatus, UnknownBookingStatus};
use diesel::result::DatabaseErrorKind;
use lifecycle::{InputError, InvalidState, LifecycleError, ReservationConflict};
use thiserror::Error;

/// Top level application error, can be converted into a [`Response`]
#[derive(Debug, Error)]
pub enum Error {
	/// Duplicate resource created
	#[error("{0}")]
	Duplicate(String),
	/// Request/operation forbidden
	#[error("forbidden")]
	Forbidden,
	/// An error that should never happen
	#[error("{0}")]
	Infallible(String),
	/// Opaque internal server error
	#[error("internal server error")]
	InternalServerError,
	/// Resource not found
	#[error("not found - {0}")]
	NotFound(String),
	/// Any error related to logging in
	#[error(transparent)]
	LoginError(#[from] LoginError),
	/// Invalid or missing token
	#[error(transparent)]
	TokenError(#[from] TokenError),
	/// Any error related to reserving or moving a booking
	#[error(transparent)]
	BookingError(#[from] BookingError),
	/// Resource could not be validated
	#[error("{0}")]
	ValidationError(String),
}

impl Error {
	/// Return a unique identifying code for this error
	///
	/// When modifying this function the error code should only ever increase,
	/// an error code should never be reused once its assigned to avoid
	/// unexpectedly breaking clients
	fn code(&self) -> i32 {
		match self {
			Self::Duplicate(_) => 1,
			Self::Forbidden => 2,
			Self::Infallible(_) => 3,
			Self::InternalServerError => 4,
			Self::NotFound(_) => 5,
			Self::LoginError(e) => {
				match e {
					LoginError::UnknownUsername(_) => 6,
					LoginError::InvalidPassword => 7,
				}
			},
			Self::TokenError(e) => {
				match e {
					TokenError::MissingAccessToken => 8,
					TokenError::MissingSession => 9,
				}
			},
			Self::ValidationError(_) => 10,
			Self::BookingError(e) => {
				match e {
					BookingError::InvalidState { .. } => 11,
					BookingError::CapacityExceeded { .. } => 12,
					BookingError::DuplicateReservation => 13,
				}
			},
		}
	}

	/// Return additional information about the error
	fn info(&self) -> Option<String> {
		match self {
			Self::Duplicate(m)
			| Self::NotFound(m)
			| Self::LoginError(LoginError::UnknownUsername(m))
			| Self::ValidationError(m) => Some(m.to_owned()),
			Self::BookingError(e) => {
				match e {
					BookingError::InvalidState { current, requested } => {
						Some(
							serde_json::json!({
								"current": current,
								"requested": requested,
							})
							.to_string(),
						)
					},
					BookingError::CapacityExceeded { date, slot, capacity } => {
						Some(
							serde_json::json!({
								"date": date,
								"slot": slot,
								"capacity": capacity,
							})
							.to_string(),
						)
					},
					BookingError::DuplicateReservation => None,
				}
			},
			_ => None,
		}
	}
}

/// Convert an error into a [`Response`]
impl IntoResponse for Error {
	fn into_response(self) -> Response {
		error!("{self:?}");

		let message = self.to_string();

		let data = serde_json::json!({
			"message": message,
			"code": self.code(),
			"info": self.info(),
		});

		let status = match self {
			Self::Duplicate(_) | Self::BookingError(_) => StatusCode::CONFLICT,
			Self::InternalServerError | Self::Infallible(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			},
			Self::TokenError(_) => StatusCode::UNAUTHORIZED,
			Self::Forbidden | Self::LoginError(_) => StatusCode::FORBIDDEN,
			Self::NotFound(_) => StatusCode::NOT_FOUND,
			Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
		};

		(status, axum::Json(data)).into_response()
	}
}

/// Any error related to logging in
#[derive(Debug, Error)]
pub enum LoginError {
	#[error("no profile with username '{0}' was found")]
	UnknownUsername(String),
	#[error("invalid password")]
	InvalidPassword,
}

/// Any error related to a token
#[derive(Debug, Error)]
pub enum TokenError {
	#[error("missing or invalid access token")]
	MissingAccessToken,
	#[error("missing session")]
	MissingSession,
}

/// Any error related to reserving a slot or moving a booking along its
/// lifecycle
#[derive(Debug, Error)]
pub enum BookingError {
	/// The requested status cannot be reached from the current one
	#[error("cannot move booking from {current} to {requested}")]
	InvalidState { current: BookingStatus, requested: BookingStatus },
	/// The slot has no places left
	#[error("time slot '{slot}' on {date} is fully booked")]
	CapacityExceeded { date: NaiveDate, slot: String, capacity: u32 },
	/// The profile already holds a booking for this slot
	#[error("you already hold a booking for this time slot")]
	DuplicateReservation,
}

/// A list of possible internal errors
///
/// API end users should never see these details
#[derive(Debug, Error)]
pub enum InternalServerError {
	/// Error executing some database operation
	#[error("database error -- {0:?}")]
	DatabaseError(diesel::result::Error),
	/// Error interacting with a database connection
	#[error("database interaction error -- {0:?}")]
	DatabaseInteractionError(deadpool_diesel::InteractError),
	/// Error hashing some value
	#[error("hash error -- {0:?}")]
	HashError(argon2::password_hash::Error),
	/// Error acquiring database pool connection
	#[error("database pool error -- {0:?}")]
	PoolError(deadpool_diesel::PoolError),
	/// Error executing some redis operation
	#[error("redis error -- {0:?}")]
	RedisError(redis::RedisError),
	/// Error related to `serde_json`
	#[error("serde_json error -- {0:?}")]
	SerdeJsonError(serde_json::Error),
	/// Attempted to extract a session from a request that has not been
	/// authorized
	#[error("attempted to extract session without checking authorization")]
	SessionWithoutAuthError,
}

// Map internal server errors to application errors
impl From<InternalServerError> for Error {
	fn from(value: InternalServerError) -> Self {
		error!("internal server error -- {value}");

		Self::InternalServerError
	}
}

impl From<InvalidState> for Error {
	fn from(value: InvalidState) -> Self {
		BookingError::InvalidState {
			current:   value.current,
			requested: value.requested,
		}
		.into()
	}
}

impl From<InputError> for Error {
	fn from(value: InputError) -> Self { Self::ValidationError(value.to_string()) }
}

impl From<ReservationConflict> for Error {
	fn from(value: ReservationConflict) -> Self {
		match value {
			ReservationConflict::AlreadyHeld => {
				BookingError::DuplicateReservation.into()
			},
			ReservationConflict::Full { date, slot, capacity } => {
				BookingError::CapacityExceeded { date, slot, capacity }.into()
			},
		}
	}
}

/// Map lifecycle rule violations to application errors
impl From<LifecycleError> for Error {
	fn from(value: LifecycleError) -> Self {
		match value {
			LifecycleError::InvalidState(e) => e.into(),
			LifecycleError::Input(e) => e.into(),
			LifecycleError::Conflict(e) => e.into(),
		}
	}
}

impl From<UnknownBookingStatus> for Error {
	fn from(value: UnknownBookingStatus) -> Self {
		Self::ValidationError(value.to_string())
	}
}

/// Map validation errors to application errors
impl From<validator::ValidationErrors> for Error {
	fn from(err: validator::ValidationErrors) -> Self {
		let errs = err.field_errors();
		let repr = errs
			.values()
			.map(|v| {
				v.iter()
					.map(ToString::to_string)
					.collect::<Vec<String>>()
					.join("\n")
			})
			.collect::<Vec<String>>()
			.join("\n");

		Self::ValidationError(repr)
	}
}

/// Map password hashing errors to application errors
impl From<argon2::password_hash::Error> for Error {
	fn from(err: argon2::password_hash::Error) -> Self {
		match err {
			argon2::password_hash::Error::Password => {
				LoginError::InvalidPassword.into()
			},
			_ => InternalServerError::HashError(err).into(),
		}
	}
}

/// Map database interaction errors to application errors
impl From<deadpool_diesel::InteractError> for Error {
	fn from(value: deadpool_diesel::InteractError) -> Self {
		InternalServerError::DatabaseInteractionError(value).into()
	}
}

/// What a violated unique constraint means for the caller
enum UniqueConstraint {
	Column(&'static str),
	ActiveBooking,
}

/// Map of constraint names to their meaning
static UNIQUE_CONSTRAINTS: LazyLock<HashMap<&str, UniqueConstraint>> =
	LazyLock::new(|| {
		HashMap::from([
			("profile_username_key", UniqueConstraint::Column("username")),
			("profile_email_key", UniqueConstraint::Column("email")),
			("booking_active_owner_slot_key", UniqueConstraint::ActiveBooking),
		])
	});

/// Map database result errors to application errors.
impl From<diesel::result::Error> for Error {
	fn from(err: diesel::result::Error) -> Self {
		match &err {
			// No rows returned by query that expected at least one
			diesel::result::Error::NotFound => {
				Self::NotFound("no context provided".to_string())
			},
			// Unique constraint violation
			diesel::result::Error::DatabaseError(
				DatabaseErrorKind::UniqueViolation,
				info,
			) => {
				let constraint = info
					.constraint_name()
					.and_then(|name| UNIQUE_CONSTRAINTS.get(name));

				match constraint {
					Some(UniqueConstraint::Column(field)) => {
						Self::Duplicate(format!("{field} is already in use"))
					},
					Some(UniqueConstraint::ActiveBooking) => {
						BookingError::DuplicateReservation.into()
					},
					None => InternalServerError::DatabaseError(err).into(),
				}
			},
			// Foreign key or check constraint violation
			diesel::result::Error::DatabaseError(
				DatabaseErrorKind::ForeignKeyViolation
				| DatabaseErrorKind::CheckViolation,
				info,
			) => Error::ValidationError(info.message().to_string()),
			_ => InternalServerError::DatabaseError(err).into(),
		}
	}
}

impl From<deadpool_diesel::PoolError> for Error {
	fn from(value: deadpool_diesel::PoolError) -> Self {
		InternalServerError::PoolError(value).into()
	}
}

impl From<redis::RedisError> for Error {
	fn from(err: redis::RedisError) -> Self {
		InternalServerError::RedisError(err).into()
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		InternalServerError::SerdeJsonError(err).into()
	}
}
