use booking::Booking;
use chrono::{NaiveDate, NaiveDateTime};
use db::BookingStatus;
use lifecycle::SlotAvailability;
use primitive_booking::PrimitiveBooking;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use uuid::Uuid;
use validator_derive::Validate;

use crate::schemas::profile::ProfileResponse;
use crate::schemas::ser_includes;

#[skip_serializing_none]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
	pub id:         Uuid,
	pub profile_id: i32,
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: i32,
	pub deposit:    i32,
	pub status:     BookingStatus,
	#[serialize_always]
	pub expires_at: Option<NaiveDateTime>,
	pub created_at: NaiveDateTime,
	pub updated_at: NaiveDateTime,
	#[serde(default, serialize_with = "ser_includes")]
	pub profile:    Option<Option<ProfileResponse>>,
}

impl From<PrimitiveBooking> for BookingResponse {
	fn from(booking: PrimitiveBooking) -> Self {
		Self {
			id:         booking.id,
			profile_id: booking.profile_id,
			date:       booking.date,
			time_slot:  booking.time_slot,
			group_size: booking.group_size,
			deposit:    booking.deposit,
			status:     booking.status,
			expires_at: booking.expires_at,
			created_at: booking.created_at,
			updated_at: booking.updated_at,
			profile:    None,
		}
	}
}

impl From<(bool, Booking)> for BookingResponse {
	/// Build a response from a joined [`Booking`], the flag tells whether
	/// the owning profile was requested
	fn from((include_profile, value): (bool, Booking)) -> Self {
		let mut response = Self::from(value.booking);

		if include_profile {
			response.profile = Some(value.profile.map(Into::into));
		}

		response
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotResponse {
	pub slot:                String,
	pub capacity:            u32,
	pub available:           u32,
	pub user_has_booking:    bool,
	pub user_booking_status: Option<BookingStatus>,
	pub selectable:          bool,
}

impl From<SlotAvailability> for AvailableSlotResponse {
	fn from(value: SlotAvailability) -> Self {
		Self {
			slot:                value.slot,
			capacity:            value.capacity,
			available:           value.available,
			user_has_booking:    value.user_has_booking,
			user_booking_status: value.user_booking_status,
			selectable:          value.selectable,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct AvailabilityQuery {
	pub date: NaiveDate,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: i32,
	#[validate(range(
		min = 0,
		message = "deposit can not be negative",
		code = "deposit-range"
	))]
	pub deposit:    Option<i32>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ExtendRequest {
	pub minutes: i64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdateStatusRequest {
	pub status: String,
}
