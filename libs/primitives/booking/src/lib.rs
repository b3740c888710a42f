#[macro_use]
extern crate tracing;

use chrono::{NaiveDate, NaiveDateTime};
use common::{DbConn, Error};
use db::{BookingStatus, booking};
use diesel::pg::Pg;
use diesel::prelude::*;
use lifecycle::BookingView;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
	Clone, Debug, Deserialize, Identifiable, Queryable, Selectable, Serialize,
)]
#[diesel(table_name = booking)]
#[diesel(check_for_backend(Pg))]
pub struct PrimitiveBooking {
	pub id:         Uuid,
	pub profile_id: i32,
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: i32,
	pub status:     BookingStatus,
	pub deposit:    i32,
	pub expires_at: Option<NaiveDateTime>,
	pub created_at: NaiveDateTime,
	pub updated_at: NaiveDateTime,
}

impl BookingView for PrimitiveBooking {
	fn owner(&self) -> i32 { self.profile_id }

	fn date(&self) -> NaiveDate { self.date }

	fn time_slot(&self) -> &str { &self.time_slot }

	fn status(&self) -> BookingStatus { self.status }

	fn expires_at(&self) -> Option<NaiveDateTime> { self.expires_at }
}

impl PrimitiveBooking {
	/// Get a [`PrimitiveBooking`] by its id
	#[instrument(skip(conn))]
	pub async fn get_by_id(b_id: Uuid, conn: &DbConn) -> Result<Self, Error> {
		let booking = conn
			.interact(move |conn| {
				use self::booking::dsl::*;

				booking.find(b_id).select(Self::as_select()).get_result(conn)
			})
			.await??;

		Ok(booking)
	}
}
