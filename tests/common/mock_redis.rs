use std::sync::{LazyLock, Mutex, MutexGuard};

use redis::aio::MultiplexedConnection;
use redis::cmd;

/// Number of logical databases a default redis server offers
const REDIS_DATABASES: usize = 16;

static REDIS_URLS: LazyLock<[Mutex<String>; REDIS_DATABASES]> =
	LazyLock::new(|| {
		let redis_url = std::env::var("REDIS_URL").unwrap();

		std::array::from_fn(|db| Mutex::new(format!("{redis_url}/{db}")))
	});

/// Hands out exclusive access to one redis database per test
pub struct RedisUrlProvider;

/// A locked redis database, flushed when dropped
pub struct RedisUrlGuard(MutexGuard<'static, String>);

impl RedisUrlProvider {
	/// Loop over all databases until a free one is found
	pub fn acquire() -> RedisUrlGuard {
		let mut i = 0;

		loop {
			if let Ok(lock) = REDIS_URLS[i].try_lock() {
				return RedisUrlGuard(lock);
			}

			i = (i + 1) % REDIS_DATABASES;
		}
	}
}

impl RedisUrlGuard {
	pub async fn connect(&self) -> MultiplexedConnection {
		let client = redis::Client::open(self.0.as_str()).unwrap();
		client.get_multiplexed_async_connection().await.unwrap()
	}
}

impl Drop for RedisUrlGuard {
	fn drop(&mut self) {
		futures::executor::block_on(async {
			let mut conn = self.connect().await;

			let _: bool = cmd("FLUSHDB").query_async(&mut conn).await.unwrap();
		});
	}
}
