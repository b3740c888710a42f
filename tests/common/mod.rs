use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum_extra::extract::cookie::Key;
use axum_test::{TestResponse, TestServer};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use common::DbPool;
use lifecycle::{ManualClock, SlotCatalogue};
use mock_redis::{RedisUrlGuard, RedisUrlProvider};
use tourbook::schemas::auth::LoginRequest;
use tourbook::schemas::booking::BookingResponse;
use tourbook::{AppState, Config, SeedProfile, Seeder, routes};

mod mock_db;
mod mock_redis;

use mock_db::{DATABASE_PROVIDER, DatabaseGuard};

/// Places per slot in the test app
pub const TEST_CAPACITY: u32 = 2;

/// Password of every seeded profile
pub const TEST_PASSWORD: &str = "foobarbazqux";

pub const TEST_SLOT: &str = "09:00 - 10:00";

/// Date of the tour the tests book, one day after [`start_time`]
#[must_use]
pub fn tour_date() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 3, 20).unwrap() }

/// Time the test clock starts at, the evening before [`tour_date`]
#[must_use]
pub fn start_time() -> NaiveDateTime {
	NaiveDate::from_ymd_opt(2025, 3, 19)
		.unwrap()
		.and_hms_opt(18, 0, 0)
		.unwrap()
}

fn test_config() -> Config {
	Config {
		production:            false,
		database_url:          std::env::var("DATABASE_URL").unwrap(),
		redis_url:             std::env::var("REDIS_URL").unwrap(),
		access_token_name:     "tourbook_access_token".to_string(),
		access_token_lifetime: time::Duration::minutes(60),
		slot_capacity:         TEST_CAPACITY,
		hold_window:           TimeDelta::minutes(15),
		default_deposit:       2500,
		time_slots:            SlotCatalogue::default(),
		sweep_interval:        None,
	}
}

#[allow(dead_code)]
pub struct TestEnv {
	pub app:         TestServer,
	pub router:      Router,
	pub clock:       Arc<ManualClock>,
	pub pool:        DbPool,
	pub db_guard:    DatabaseGuard,
	pub redis_guard: RedisUrlGuard,
}

#[allow(dead_code)]
impl TestEnv {
	/// Get a test environment with mocked resources for running tests
	///
	/// # Panics
	/// Panics if building a test server fails
	pub async fn new() -> Self {
		let config = test_config();

		let test_pool_guard = (*DATABASE_PROVIDER).acquire().await;
		let test_pool = test_pool_guard.create_pool().await;

		{
			let conn = test_pool.get().await.unwrap();

			Seeder::new(&conn)
				.populate("seed/profiles.json", async |conn, profiles| {
					for profile in profiles {
						SeedProfile::insert(profile, conn).await?;
					}

					Ok(())
				})
				.await;
		}

		let redis_url_guard = RedisUrlProvider::acquire();
		let redis_connection = redis_url_guard.connect().await;

		let cookie_jar_key = Key::from(&[0u8; 64]);

		let clock = Arc::new(ManualClock::new(start_time()));

		let state = AppState {
			config,
			database_pool: test_pool.clone(),
			redis_connection,
			cookie_jar_key,
			clock: clock.clone(),
		};
		let router = routes::get_app_router(state);

		let test_server =
			TestServer::builder().save_cookies().build(router.clone()).unwrap();

		TestEnv {
			app: test_server,
			router,
			clock,
			pool: test_pool,
			db_guard: test_pool_guard,
			redis_guard: redis_url_guard,
		}
	}

	/// Log the default test server in as the given seeded profile
	pub async fn login(self, username: &str) -> Self {
		login(&self.app, username).await;

		self
	}

	/// Get a separate logged in test server for another seeded profile
	pub async fn client(&self, username: &str) -> TestServer {
		let server = TestServer::builder()
			.save_cookies()
			.build(self.router.clone())
			.unwrap();

		login(&server, username).await;

		server
	}

	/// Move the shared test clock forward
	pub fn advance(&self, delta: TimeDelta) { self.clock.advance(delta); }

	/// Reserve [`TEST_SLOT`] on [`tour_date`] through the default server
	pub async fn reserve(&self, group_size: i32) -> TestResponse {
		reserve(&self.app, TEST_SLOT, group_size).await
	}

	/// Reserve a slot and return the created booking
	///
	/// # Panics
	/// Panics if the reservation is rejected
	pub async fn reserved_booking(&self) -> BookingResponse {
		let response = self.reserve(5).await;
		assert_eq!(response.status_code(), StatusCode::CREATED);

		response.json::<BookingResponse>()
	}

	/// Move a booking to a status through the admin override route
	pub async fn admin_set_status(
		&self,
		booking: &BookingResponse,
		status: &str,
	) -> TestResponse {
		let admin = self.client("admin").await;

		admin
			.patch(&format!("/bookings/{}/status", booking.id))
			.json(&serde_json::json!({ "status": status }))
			.await
	}
}

/// Log a test server in as a seeded profile
///
/// # Panics
/// Panics if the login is rejected
pub async fn login(server: &TestServer, username: &str) {
	let response = server
		.post("/auth/login")
		.json(&LoginRequest {
			username: username.to_string(),
			password: TEST_PASSWORD.to_string(),
		})
		.await;

	assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
}

/// Reserve a slot on [`tour_date`]
pub async fn reserve(
	server: &TestServer,
	slot: &str,
	group_size: i32,
) -> TestResponse {
	server
		.post("/bookings/reserve")
		.json(&serde_json::json!({
			"date": tour_date(),
			"timeSlot": slot,
			"groupSize": group_size,
		}))
		.await
}
