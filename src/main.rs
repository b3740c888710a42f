#[macro_use]
extern crate tracing;

use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use lifecycle::SystemClock;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tourbook::{AppState, Config, routes, sweeper};
use tracing::Level;

#[tokio::main]
async fn main() {
	// Set up the tracing subscriber.
	// This will print out all logs to the console.
	tracing_subscriber::fmt()
		.pretty()
		.with_thread_names(true)
		.with_max_level(Level::INFO)
		.init();

	// Load the configuration from the environment,
	// and create a database pool.
	let config = Config::from_env();
	let database_pool = config.create_database_pool();
	let redis_connection = config.create_redis_connection().await;

	let cookie_jar_key = match std::fs::read("/run/secrets/cookie-jar-key") {
		Ok(key) => Key::from(&key),
		Err(e) if !config.production => {
			warn!("could not read cookie jar key ({e}), generating one");

			Key::generate()
		},
		Err(e) => panic!("COULD NOT READ COOKIE JAR KEY -- {e}"),
	};

	let state = AppState {
		config,
		database_pool,
		redis_connection,
		cookie_jar_key,
		clock: Arc::new(SystemClock),
	};

	// Expire lapsed holds in the background if configured
	if let Some(sweeper) = sweeper::Sweeper::from_state(&state) {
		tokio::spawn(sweeper.run());
	}

	// Create the app router and listener.
	let router = routes::get_app_router(state);

	let listener = TcpListener::bind("0.0.0.0:80").await.unwrap();

	// Start the server.
	debug!("listening on {}", listener.local_addr().unwrap());
	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown_handler())
		.await
		.unwrap();
}

/// Gracefully shutdown the server on SIGINT or SIGTERM.
async fn shutdown_handler() {
	let ctrl_c = async {
		signal::ctrl_c().await.expect("COULD NOT INSTALL CTRL+C HANDLER");
	};

	let terminate = async {
		signal::unix::signal(SignalKind::terminate())
			.expect("COULD NOT INSTALL TERMINATE SIGNAL HANDLER")
			.recv()
			.await;
	};

	tokio::select! {
		() = ctrl_c => {},
		() = terminate => {},
	}
}
