#[macro_use]
extern crate tracing;

use chrono::{NaiveDate, NaiveDateTime};
use common::{DbConn, Error};
use db::{BookingStatus, booking, profile};
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use lifecycle::{
	Actor,
	BookingView,
	ExpiryPolicy,
	GroupSize,
	Hold,
	InvalidState,
	Transition,
};
use models_common::{BoxedCondition, QUERY_HARD_LIMIT, ToFilter};
use primitive_booking::PrimitiveBooking;
use primitive_profile::PrimitiveProfile;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type JoinedBookingData = (PrimitiveBooking, Option<PrimitiveProfile>);

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingFilter {
	pub date:   Option<NaiveDate>,
	pub status: Option<BookingStatus>,
}

impl<S> ToFilter<S> for BookingFilter
where
	S: 'static,
	booking::date: SelectableExpression<S>,
	booking::status: SelectableExpression<S>,
{
	type SqlType = Bool;

	fn to_filter(&self) -> BoxedCondition<S, Self::SqlType> {
		let mut filter: BoxedCondition<S, Self::SqlType> =
			Box::new(true.into_sql::<Bool>());

		if let Some(date) = self.date {
			filter = Box::new(filter.and(booking::date.eq(date)));
		}

		if let Some(status) = self.status {
			filter = Box::new(filter.and(booking::status.eq(status)));
		}

		filter
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingIncludes {
	#[serde(default)]
	pub profile: bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Booking {
	pub booking: PrimitiveBooking,
	pub profile: Option<PrimitiveProfile>,
}

mod auto_type_helpers {
	pub use diesel::dsl::{LeftJoin as LeftOuterJoin, *};
}

/// Write `transition` to a booking, but only if it is still in the status the
/// transition was computed from
///
/// Returns [`None`] when another request moved the booking first.
fn write_transition(
	conn: &mut PgConnection,
	b_id: Uuid,
	transition: Transition,
	now: NaiveDateTime,
) -> QueryResult<Option<PrimitiveBooking>> {
	use self::booking::dsl::*;

	diesel::update(booking.find(b_id))
		.filter(status.eq(transition.from_status()))
		.set((
			status.eq(transition.to_status()),
			expires_at.eq(transition.expires_at()),
			updated_at.eq(now),
		))
		.returning(PrimitiveBooking::as_returning())
		.get_result(conn)
		.optional()
}

/// Persist the expiry of every lapsed hold in `bookings`, returning the
/// number of holds that were expired
fn expire_holds(
	conn: &mut PgConnection,
	bookings: &[PrimitiveBooking],
	now: NaiveDateTime,
) -> QueryResult<usize> {
	let mut expired = 0;

	for b in bookings {
		if let Some(t) = lifecycle::settle(b, now) {
			if write_transition(conn, b.id, t, now)?.is_some() {
				expired += 1;
			}
		}
	}

	Ok(expired)
}

impl Booking {
	/// Build a query with all required (dynamic) joins to select a full
	/// booking data tuple
	#[diesel::dsl::auto_type(no_type_alias, dsl_path = "auto_type_helpers")]
	fn joined_query(includes: BookingIncludes) -> _ {
		let inc_profile: bool = includes.profile;

		let profile_join = profile::table.on(booking::profile_id
			.eq(profile::id)
			.and(inc_profile.into_sql::<Bool>()));

		booking::table.left_outer_join(profile_join)
	}

	/// Construct a full [`Booking`] struct from the data returned by a joined
	/// query
	fn from_joined(includes: BookingIncludes, data: JoinedBookingData) -> Self {
		Self {
			booking: data.0,
			profile: if includes.profile { data.1 } else { None },
		}
	}

	/// Get a [`Booking`] given its id
	#[instrument(skip(conn))]
	pub async fn get_by_id(
		b_id: Uuid,
		includes: BookingIncludes,
		conn: &DbConn,
	) -> Result<Self, Error> {
		let query = Self::joined_query(includes);

		let booking = conn
			.interact(move |conn| {
				query
					.filter(booking::id.eq(b_id))
					.select((
						PrimitiveBooking::as_select(),
						profile::all_columns.nullable(),
					))
					.get_result(conn)
			})
			.await??;

		Ok(Self::from_joined(includes, booking))
	}

	/// Get all the bookings of a specific profile, newest tour date first
	#[instrument(skip(conn))]
	pub async fn for_profile(
		p_id: i32,
		includes: BookingIncludes,
		conn: &DbConn,
	) -> Result<Vec<Self>, Error> {
		let query = Self::joined_query(includes);

		let bookings = conn
			.interact(move |conn| {
				query
					.filter(booking::profile_id.eq(p_id))
					.order((booking::date.desc(), booking::created_at.desc()))
					.limit(QUERY_HARD_LIMIT)
					.select((
						PrimitiveBooking::as_select(),
						profile::all_columns.nullable(),
					))
					.get_results(conn)
			})
			.await??
			.into_iter()
			.map(|data| Self::from_joined(includes, data))
			.collect();

		Ok(bookings)
	}

	/// Get all bookings matching a filter
	#[instrument(skip(conn))]
	pub async fn list(
		filter: BookingFilter,
		includes: BookingIncludes,
		conn: &DbConn,
	) -> Result<Vec<Self>, Error> {
		let filter = filter.to_filter();
		let query = Self::joined_query(includes);

		let bookings = conn
			.interact(move |conn| {
				query
					.filter(filter)
					.order((
						booking::date.asc(),
						booking::time_slot.asc(),
						booking::created_at.asc(),
					))
					.limit(QUERY_HARD_LIMIT)
					.select((
						PrimitiveBooking::as_select(),
						profile::all_columns.nullable(),
					))
					.get_results(conn)
			})
			.await??
			.into_iter()
			.map(|data| Self::from_joined(includes, data))
			.collect();

		Ok(bookings)
	}

	/// Get the bookings on a given date that may still take up a place,
	/// including holds that lapsed but were not yet expired
	#[instrument(skip(conn))]
	pub async fn active_on(
		d: NaiveDate,
		conn: &DbConn,
	) -> Result<Vec<PrimitiveBooking>, Error> {
		let bookings = conn
			.interact(move |conn| {
				use self::booking::dsl::*;

				booking
					.filter(date.eq(d))
					.filter(status.ne_all(BookingStatus::released()))
					.select(PrimitiveBooking::as_select())
					.get_results(conn)
			})
			.await??;

		Ok(bookings)
	}

	/// Persist the expiry of a booking if its hold lapsed, returning the
	/// booking as it is now stored
	#[instrument(skip(conn))]
	pub async fn settle(
		booking: PrimitiveBooking,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<PrimitiveBooking, Error> {
		let Some(transition) = lifecycle::settle(&booking, now) else {
			return Ok(booking);
		};

		let b_id = booking.id;

		let updated = conn
			.interact(move |conn| write_transition(conn, b_id, transition, now))
			.await??;

		match updated {
			Some(updated) => {
				info!("expired lapsed hold on booking {b_id}");

				Ok(updated)
			},
			None => PrimitiveBooking::get_by_id(b_id, conn).await,
		}
	}

	/// Move a booking to `requested` on behalf of `actor`
	///
	/// The booking is settled first, so a lapsed hold is recorded as expired
	/// even when the requested move is rejected.
	#[instrument(skip(conn))]
	pub async fn advance(
		booking: PrimitiveBooking,
		requested: BookingStatus,
		actor: Actor,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<PrimitiveBooking, Error> {
		let booking = Self::settle(booking, now, conn).await?;
		let transition = lifecycle::transition(&booking, requested, actor, now)?;

		let updated = Self::apply(booking.id, transition, now, conn).await?;

		info!(
			"moved booking {} from {} to {} as {actor:?}",
			updated.id,
			transition.from_status(),
			transition.to_status(),
		);

		Ok(updated)
	}

	/// Push back the expiry of a running hold
	#[instrument(skip(conn))]
	pub async fn extend(
		booking: PrimitiveBooking,
		policy: ExpiryPolicy,
		minutes: i64,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<PrimitiveBooking, Error> {
		let booking = Self::settle(booking, now, conn).await?;
		let transition = policy.extend(&booking, minutes, now)?;

		let updated = Self::apply(booking.id, transition, now, conn).await?;

		info!("extended hold on booking {} by {minutes} minutes", updated.id);

		Ok(updated)
	}

	/// Write a [`Transition`] to the booking with the given id
	///
	/// Fails with an invalid state error when the booking was moved by
	/// someone else since the transition was computed.
	#[instrument(skip(conn))]
	pub async fn apply(
		b_id: Uuid,
		transition: Transition,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<PrimitiveBooking, Error> {
		let updated = conn
			.interact(move |conn| write_transition(conn, b_id, transition, now))
			.await??;

		if let Some(updated) = updated {
			return Ok(updated);
		}

		let current = PrimitiveBooking::get_by_id(b_id, conn).await?;

		Err(InvalidState {
			current:   current.status(),
			requested: transition.to_status(),
		}
		.into())
	}

	/// Expire every hold that lapsed before `now`
	#[instrument(skip(conn))]
	pub async fn expire_lapsed(
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<usize, Error> {
		let count = conn
			.interact(move |conn| {
				conn.transaction::<_, Error, _>(|conn| {
					use self::booking::dsl::*;

					let lapsed = booking
						.filter(status.eq(BookingStatus::SlotReserved))
						.filter(expires_at.lt(now))
						.for_update()
						.skip_locked()
						.select(PrimitiveBooking::as_select())
						.get_results(conn)?;

					Ok(expire_holds(conn, &lapsed, now)?)
				})
			})
			.await??;

		if count > 0 {
			info!("expired {count} lapsed holds");
		}

		Ok(count)
	}

	/// Mark confirmed bookings whose tour date lies before `today` as no-shows
	#[instrument(skip(conn))]
	pub async fn mark_no_shows(
		today: NaiveDate,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<usize, Error> {
		let count = conn
			.interact(move |conn| {
				conn.transaction::<_, Error, _>(|conn| {
					use self::booking::dsl::*;

					let missed = booking
						.filter(status.eq(BookingStatus::Confirmed))
						.filter(date.lt(today))
						.for_update()
						.skip_locked()
						.select(PrimitiveBooking::as_select())
						.get_results(conn)?;

					let mut marked = 0;

					for b in &missed {
						let transition = lifecycle::transition(
							b,
							BookingStatus::NoShow,
							Actor::System,
							now,
						)?;

						if write_transition(conn, b.id, transition, now)?.is_some() {
							marked += 1;
						}
					}

					Ok(marked)
				})
			})
			.await??;

		if count > 0 {
			info!("marked {count} bookings as no-show");
		}

		Ok(count)
	}
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = booking)]
#[diesel(check_for_backend(Pg))]
struct InsertableBooking {
	id:         Uuid,
	profile_id: i32,
	date:       NaiveDate,
	time_slot:  String,
	group_size: i32,
	status:     BookingStatus,
	deposit:    i32,
	expires_at: Option<NaiveDateTime>,
	created_at: NaiveDateTime,
	updated_at: NaiveDateTime,
}

/// A request to hold a place in a time slot
#[derive(Clone, Debug)]
pub struct NewBooking {
	pub profile_id: i32,
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: GroupSize,
	pub deposit:    i32,
}

impl NewBooking {
	/// Take a place in the requested slot under `hold`
	///
	/// Reservations for the same date and slot are serialized through a
	/// transaction scoped advisory lock, so the capacity check and the insert
	/// can not interleave with another reservation for that slot. Lapsed
	/// holds in the slot are expired before counting.
	#[instrument(skip(conn))]
	pub async fn reserve(
		self,
		hold: Hold,
		capacity: u32,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<PrimitiveBooking, Error> {
		let booking = conn
			.interact(move |conn| {
				conn.transaction::<_, Error, _>(|conn| {
					use self::booking::dsl::*;

					let lock_key = format!("{}|{}", self.date, self.time_slot);

					diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
						.bind::<Text, _>(lock_key)
						.execute(conn)?;

					let occupying: Vec<PrimitiveBooking> = booking
						.filter(date.eq(self.date))
						.filter(time_slot.eq(&self.time_slot))
						.filter(status.ne_all(BookingStatus::released()))
						.select(PrimitiveBooking::as_select())
						.get_results(conn)?;

					expire_holds(conn, &occupying, now)?;

					lifecycle::check_reservation(
						capacity,
						self.date,
						&self.time_slot,
						self.profile_id,
						&occupying,
						now,
					)?;

					let new = InsertableBooking {
						id:         Uuid::new_v4(),
						profile_id: self.profile_id,
						date:       self.date,
						time_slot:  self.time_slot,
						group_size: self.group_size.get(),
						status:     hold.status(),
						deposit:    self.deposit,
						expires_at: Some(hold.expires_at()),
						created_at: now,
						updated_at: now,
					};

					let inserted = diesel::insert_into(booking)
						.values(new)
						.returning(PrimitiveBooking::as_returning())
						.get_result(conn)?;

					Ok(inserted)
				})
			})
			.await??;

		info!("created booking {booking:?}");

		Ok(booking)
	}
}
