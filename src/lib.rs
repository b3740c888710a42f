//! # Tour booking backend library

#[macro_use]
extern crate tracing;

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use common::{DbPool, RedisConn};
use lifecycle::Clock;

mod config;
mod seeder;

pub mod controllers;
pub mod middleware;
pub mod routes;
pub mod schemas;
pub mod session;
pub mod sweeper;

pub use config::*;
pub use seeder::*;

/// Source of the current time shared by all request handlers
pub type SharedClock = Arc<dyn Clock>;

/// Common state of the app
#[derive(Clone)]
pub struct AppState {
	pub config:           Config,
	pub database_pool:    DbPool,
	pub redis_connection: RedisConn,
	pub cookie_jar_key:   Key,
	pub clock:            SharedClock,
}

impl FromRef<AppState> for Config {
	fn from_ref(input: &AppState) -> Self { input.config.clone() }
}

impl FromRef<AppState> for DbPool {
	fn from_ref(input: &AppState) -> Self { input.database_pool.clone() }
}

impl FromRef<AppState> for RedisConn {
	fn from_ref(input: &AppState) -> Self { input.redis_connection.clone() }
}

impl FromRef<AppState> for Key {
	fn from_ref(input: &AppState) -> Self { input.cookie_jar_key.clone() }
}

impl FromRef<AppState> for SharedClock {
	fn from_ref(input: &AppState) -> Self { input.clock.clone() }
}
