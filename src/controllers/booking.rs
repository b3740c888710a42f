//! Controllers for tour bookings

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking::{Booking, BookingFilter, BookingIncludes, NewBooking};
use common::{DbConn, DbPool, Error};
use db::BookingStatus;
use lifecycle::{
	Actor,
	AvailabilityCalculator,
	GroupSize,
	InvalidState,
	check_reservable_date,
	effective_status,
};
use primitive_booking::PrimitiveBooking;
use uuid::Uuid;
use validator::Validate;

use crate::schemas::booking::{
	AvailabilityQuery,
	AvailableSlotResponse,
	BookingResponse,
	ExtendRequest,
	ReserveRequest,
	UpdateStatusRequest,
};
use crate::session::{AdminSession, Session};
use crate::{Config, SharedClock};

/// Load a booking and work out who is acting on it
///
/// The owner always acts as [`Actor::Owner`], admins act on other people's
/// bookings as [`Actor::Admin`] and everybody else is turned away.
async fn load_for_session(
	b_id: Uuid,
	session: &Session,
	conn: &DbConn,
) -> Result<(PrimitiveBooking, Actor), Error> {
	let booking = PrimitiveBooking::get_by_id(b_id, conn).await?;

	if booking.profile_id == session.data.profile_id {
		return Ok((booking, Actor::Owner));
	}

	if session.data.profile_is_admin {
		return Ok((booking, Actor::Admin));
	}

	Err(Error::Forbidden)
}

/// Load a booking that only its owner may act on
async fn load_owned(
	b_id: Uuid,
	session: &Session,
	conn: &DbConn,
) -> Result<PrimitiveBooking, Error> {
	match load_for_session(b_id, session, conn).await? {
		(booking, Actor::Owner) => Ok(booking),
		_ => Err(Error::Forbidden),
	}
}

#[instrument(skip(pool, config, clock))]
pub(crate) async fn get_available_slots(
	State(pool): State<DbPool>,
	State(config): State<Config>,
	State(clock): State<SharedClock>,
	session: Session,
	Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailableSlotResponse>>, Error> {
	let now = clock.now();

	let conn = pool.get().await?;
	let bookings = Booking::active_on(query.date, &conn).await?;

	let calculator =
		AvailabilityCalculator::new(&config.time_slots, config.slot_capacity);

	let slots = calculator
		.for_date(query.date, &bookings, Some(session.data.profile_id), now)
		.into_iter()
		.map(Into::into)
		.collect();

	Ok(Json(slots))
}

#[instrument(skip(pool, config, clock))]
pub(crate) async fn reserve_slot(
	State(pool): State<DbPool>,
	State(config): State<Config>,
	State(clock): State<SharedClock>,
	session: Session,
	Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), Error> {
	request.validate()?;

	let now = clock.now();

	let time_slot = config.time_slots.resolve(&request.time_slot)?.to_string();
	let group_size = GroupSize::try_from(request.group_size)?;
	check_reservable_date(request.date, now.date())?;

	let new_booking = NewBooking {
		profile_id: session.data.profile_id,
		date: request.date,
		time_slot,
		group_size,
		deposit: request.deposit.unwrap_or(config.default_deposit),
	};

	let hold = config.expiry_policy().open_hold(now);

	let conn = pool.get().await?;
	let booking =
		new_booking.reserve(hold, config.slot_capacity, now, &conn).await?;

	Ok((StatusCode::CREATED, Json(booking.into())))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn get_own_bookings(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
) -> Result<Json<Vec<BookingResponse>>, Error> {
	let now = clock.now();
	let includes = BookingIncludes::default();

	let conn = pool.get().await?;
	let bookings =
		Booking::for_profile(session.data.profile_id, includes, &conn).await?;

	let mut response = Vec::with_capacity(bookings.len());

	for booking in bookings {
		let booking = Booking::settle(booking.booking, now, &conn).await?;

		response.push(booking.into());
	}

	Ok(Json(response))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn get_booking(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let (booking, _) = load_for_session(b_id, &session, &conn).await?;
	let booking = Booking::settle(booking, clock.now(), &conn).await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn confirm_reservation(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let booking = load_owned(b_id, &session, &conn).await?;
	let booking = Booking::advance(
		booking,
		BookingStatus::AwaitingPayment,
		Actor::Owner,
		clock.now(),
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn cancel_reservation(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let (booking, actor) = load_for_session(b_id, &session, &conn).await?;
	let booking = Booking::advance(
		booking,
		BookingStatus::Cancelled,
		actor,
		clock.now(),
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, config, clock))]
pub(crate) async fn extend_reservation(
	State(pool): State<DbPool>,
	State(config): State<Config>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
	Json(request): Json<ExtendRequest>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let booking = load_owned(b_id, &session, &conn).await?;
	let booking = Booking::extend(
		booking,
		config.expiry_policy(),
		request.minutes,
		clock.now(),
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn retry_payment(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let now = clock.now();
	let conn = pool.get().await?;

	let booking = load_owned(b_id, &session, &conn).await?;

	// Only a failed payment can be retried, confirming a hold has its own
	// route
	let current = effective_status(&booking, now);
	if current != BookingStatus::PaymentFailed {
		return Err(InvalidState {
			current,
			requested: BookingStatus::AwaitingPayment,
		}
		.into());
	}

	let booking = Booking::advance(
		booking,
		BookingStatus::AwaitingPayment,
		Actor::Owner,
		now,
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn request_refund(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: Session,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let (booking, actor) = load_for_session(b_id, &session, &conn).await?;
	let booking = Booking::advance(
		booking,
		BookingStatus::RefundPending,
		actor,
		clock.now(),
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn get_all_bookings(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	_session: AdminSession,
	Query(filter): Query<BookingFilter>,
	Query(includes): Query<BookingIncludes>,
) -> Result<Json<Vec<BookingResponse>>, Error> {
	let now = clock.now();

	let conn = pool.get().await?;

	// Settle lapsed holds up front so a status filter sees what callers see
	Booking::expire_lapsed(now, &conn).await?;

	let bookings = Booking::list(filter, includes, &conn).await?;

	let response = bookings
		.into_iter()
		.map(|b| BookingResponse::from((includes.profile, b)))
		.collect();

	Ok(Json(response))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn update_booking_status(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	session: AdminSession,
	Path(b_id): Path<Uuid>,
	Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, Error> {
	let requested = request.status.parse::<BookingStatus>()?;

	let conn = pool.get().await?;

	let booking = PrimitiveBooking::get_by_id(b_id, &conn).await?;
	let booking =
		Booking::advance(booking, requested, Actor::Admin, clock.now(), &conn)
			.await?;

	info!(
		"admin {} moved booking {} to {requested}",
		session.data.profile_id, booking.id,
	);

	Ok(Json(booking.into()))
}

#[instrument(skip(pool, clock))]
pub(crate) async fn check_in(
	State(pool): State<DbPool>,
	State(clock): State<SharedClock>,
	_session: AdminSession,
	Path(b_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, Error> {
	let conn = pool.get().await?;

	let booking = PrimitiveBooking::get_by_id(b_id, &conn).await?;
	let booking = Booking::advance(
		booking,
		BookingStatus::CheckedIn,
		Actor::Admin,
		clock.now(),
		&conn,
	)
	.await?;

	Ok(Json(booking.into()))
}
