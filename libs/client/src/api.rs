//! Typed access to the booking API

use chrono::{NaiveDate, NaiveDateTime};
use db::BookingStatus;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// What went wrong talking to the API
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
	Duplicate,
	Forbidden,
	NotFound,
	Unauthorized,
	Validation,
	InvalidState,
	CapacityExceeded,
	DuplicateReservation,
	Server,
	/// The server could not be reached or answered with garbage
	Network,
}

impl ApiErrorKind {
	/// Map an error code of the server to a kind
	#[must_use]
	pub fn from_code(code: i32) -> Self {
		match code {
			1 => Self::Duplicate,
			2 => Self::Forbidden,
			5 => Self::NotFound,
			6..=9 => Self::Unauthorized,
			10 => Self::Validation,
			11 => Self::InvalidState,
			12 => Self::CapacityExceeded,
			13 => Self::DuplicateReservation,
			_ => Self::Server,
		}
	}
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
	pub kind:    ApiErrorKind,
	pub message: String,
}

/// Error body every failing endpoint returns
#[derive(Debug, Deserialize)]
struct ErrorBody {
	message: String,
	code:    i32,
	info:    Option<String>,
}

impl ApiError {
	#[must_use]
	pub fn network(message: impl ToString) -> Self {
		Self { kind: ApiErrorKind::Network, message: message.to_string() }
	}

	/// Parse the body of a failed response
	///
	/// `info` replaces the generic message only for kinds where the server
	/// fills it with a readable explanation, booking conflicts carry JSON
	/// there instead.
	#[must_use]
	pub fn from_body(body: &str) -> Self {
		match serde_json::from_str::<ErrorBody>(body) {
			Ok(body) => {
				let kind = ApiErrorKind::from_code(body.code);

				let message = match (kind, body.info) {
					(
						ApiErrorKind::Duplicate
						| ApiErrorKind::NotFound
						| ApiErrorKind::Unauthorized
						| ApiErrorKind::Validation,
						Some(info),
					) => info,
					_ => body.message,
				};

				Self { kind, message }
			},
			Err(_) => Self::network(format!("unexpected error body: {body}")),
		}
	}
}

impl From<reqwest::Error> for ApiError {
	fn from(err: reqwest::Error) -> Self { Self::network(err) }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
	pub slot:                String,
	pub capacity:            u32,
	pub available:           u32,
	pub user_has_booking:    bool,
	pub user_booking_status: Option<BookingStatus>,
	pub selectable:          bool,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
	pub id:         Uuid,
	pub profile_id: i32,
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: i32,
	pub deposit:    i32,
	pub status:     BookingStatus,
	pub expires_at: Option<NaiveDateTime>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
	pub date:       NaiveDate,
	pub time_slot:  String,
	pub group_size: i32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub deposit:    Option<i32>,
}

/// Booking endpoints a client needs to hold and release a slot
pub trait BookingApi: Send + Sync {
	fn available_slots(
		&self,
		date: NaiveDate,
	) -> impl Future<Output = Result<Vec<AvailableSlot>, ApiError>> + Send;

	fn reserve(
		&self,
		reservation: &Reservation,
	) -> impl Future<Output = Result<BookingDetails, ApiError>> + Send;

	fn confirm_reservation(
		&self,
		booking_id: Uuid,
	) -> impl Future<Output = Result<BookingDetails, ApiError>> + Send;

	fn cancel_reservation(
		&self,
		booking_id: Uuid,
	) -> impl Future<Output = Result<BookingDetails, ApiError>> + Send;
}

/// [`BookingApi`] over HTTP, the session cookie is kept between requests
#[derive(Clone, Debug)]
pub struct HttpBookingApi {
	client:   Client,
	base_url: String,
}

impl HttpBookingApi {
	/// Build a client for the API at `base_url`
	///
	/// # Errors
	/// Errors if the underlying HTTP client could not be built
	pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
		let client = Client::builder().cookie_store(true).build()?;
		let base_url = base_url.into().trim_end_matches('/').to_string();

		Ok(Self { client, base_url })
	}

	fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }

	/// Start a session for the given credentials
	///
	/// # Errors
	/// Errors if the credentials are rejected or the server is unreachable
	#[instrument(skip(self, password))]
	pub async fn login(
		&self,
		username: &str,
		password: &str,
	) -> Result<(), ApiError> {
		let response = self
			.client
			.post(self.url("/auth/login"))
			.json(&serde_json::json!({
				"username": username,
				"password": password,
			}))
			.send()
			.await?;

		if response.status().is_success() {
			return Ok(());
		}

		Err(error_from(response).await)
	}
}

/// Turn a failed response into an [`ApiError`]
async fn error_from(response: Response) -> ApiError {
	match response.text().await {
		Ok(body) => ApiError::from_body(&body),
		Err(e) => e.into(),
	}
}

/// Read a JSON body from a response or the error it carries
async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
	if !response.status().is_success() {
		let err = error_from(response).await;

		debug!("booking api request failed -- {err}");

		return Err(err);
	}

	Ok(response.json::<T>().await?)
}

impl BookingApi for HttpBookingApi {
	async fn available_slots(
		&self,
		date: NaiveDate,
	) -> Result<Vec<AvailableSlot>, ApiError> {
		let response = self
			.client
			.get(self.url(&format!("/bookings/available-slots?date={date}")))
			.send()
			.await?;

		parse(response).await
	}

	async fn reserve(
		&self,
		reservation: &Reservation,
	) -> Result<BookingDetails, ApiError> {
		let response = self
			.client
			.post(self.url("/bookings/reserve"))
			.json(reservation)
			.send()
			.await?;

		parse(response).await
	}

	async fn confirm_reservation(
		&self,
		booking_id: Uuid,
	) -> Result<BookingDetails, ApiError> {
		let response = self
			.client
			.patch(self.url(&format!("/bookings/{booking_id}/confirm-reservation")))
			.send()
			.await?;

		parse(response).await
	}

	async fn cancel_reservation(
		&self,
		booking_id: Uuid,
	) -> Result<BookingDetails, ApiError> {
		let response = self
			.client
			.patch(self.url(&format!("/bookings/{booking_id}/cancel-reservation")))
			.send()
			.await?;

		parse(response).await
	}
}
