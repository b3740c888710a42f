use std::str::FromStr;

use chrono::TimeDelta;
use common::{DbPool, RedisConn};
use deadpool_diesel::postgres::{Manager, Pool};
use lifecycle::{ExpiryPolicy, SlotCatalogue};

#[derive(Clone, Debug)]
pub struct Config {
	pub production: bool,

	pub database_url: String,
	pub redis_url:    String,

	pub access_token_name:     String,
	pub access_token_lifetime: time::Duration,

	pub slot_capacity:   u32,
	pub hold_window:     TimeDelta,
	pub default_deposit: i32,
	pub time_slots:      SlotCatalogue,

	/// How often lapsed holds and missed tours are swept, [`None`] when the
	/// sweeper is disabled
	pub sweep_interval: Option<std::time::Duration>,
}

impl Config {
	fn get_env_var(var: &str) -> String {
		std::env::var(var).unwrap_or_else(|_| panic!("{var} must be set"))
	}

	fn parse_env_var<T: FromStr>(var: &str) -> T {
		Self::get_env_var(var)
			.parse::<T>()
			.unwrap_or_else(|_| panic!("{var} is not valid"))
	}

	/// Create a new [`Config`] from environment variables
	///
	/// # Panics
	/// Panics if an environment variable is missing or invalid
	#[must_use]
	pub fn from_env() -> Self {
		let production = Self::parse_env_var::<bool>("PRODUCTION");

		let database_url = Self::get_env_var("DATABASE_URL");
		let redis_url = Self::get_env_var("REDIS_URL");

		let access_token_name = Self::get_env_var("ACCESS_TOKEN_NAME");
		let access_token_lifetime = time::Duration::minutes(
			Self::parse_env_var("ACCESS_TOKEN_LIFETIME_MINUTES"),
		);

		let slot_capacity = Self::parse_env_var("SLOT_CAPACITY");
		let hold_window =
			TimeDelta::minutes(Self::parse_env_var("HOLD_WINDOW_MINUTES"));
		let default_deposit = Self::parse_env_var("DEFAULT_DEPOSIT");

		let time_slots = SlotCatalogue::parse(&Self::get_env_var("TIME_SLOTS"));
		assert!(!time_slots.is_empty(), "TIME_SLOTS must not be empty");

		let sweep_seconds: u64 = Self::parse_env_var("SWEEP_INTERVAL_SECONDS");
		let sweep_interval = (sweep_seconds > 0)
			.then(|| std::time::Duration::from_secs(sweep_seconds));

		Self {
			production,
			database_url,
			redis_url,
			access_token_name,
			access_token_lifetime,
			slot_capacity,
			hold_window,
			default_deposit,
			time_slots,
			sweep_interval,
		}
	}

	/// The hold rules configured for this app
	#[must_use]
	pub fn expiry_policy(&self) -> ExpiryPolicy {
		ExpiryPolicy::new(self.hold_window)
	}

	/// Create a database pool for the given config
	///
	/// # Panics
	/// Panics if creating the pool fails
	#[must_use]
	pub fn create_database_pool(&self) -> DbPool {
		let manager = Manager::new(
			self.database_url.to_string(),
			deadpool_diesel::Runtime::Tokio1,
		);

		Pool::builder(manager).build().unwrap()
	}

	/// Create a redis connection for the given config
	///
	/// # Panics
	/// Panics if creating the connection fails
	pub async fn create_redis_connection(&self) -> RedisConn {
		let client = redis::Client::open(self.redis_url.to_string()).unwrap();

		client.get_multiplexed_async_connection().await.unwrap()
	}
}
