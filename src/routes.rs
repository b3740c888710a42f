use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::controllers::auth::{login_profile, logout_profile, register_profile};
use crate::controllers::booking::{
	cancel_reservation,
	check_in,
	confirm_reservation,
	extend_reservation,
	get_all_bookings,
	get_available_slots,
	get_booking,
	get_own_bookings,
	request_refund,
	reserve_slot,
	retry_payment,
	update_booking_status,
};
use crate::controllers::healthcheck;
use crate::controllers::profile::get_current_profile;
use crate::middleware::{AdminLayer, AuthLayer};

/// Get the app router
pub fn get_app_router(state: AppState) -> Router {
	let api_routes = Router::new()
		.route("/healthcheck", get(healthcheck))
		.nest("/auth", auth_routes(&state))
		.nest("/profile", profile_routes(&state))
		.nest("/bookings", booking_routes(&state));

	Router::new()
		.merge(api_routes)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::with_status_code(
					StatusCode::REQUEST_TIMEOUT,
					Duration::from_secs(10),
				))
				.layer(CompressionLayer::new()),
		)
		.with_state(state)
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
	Router::new()
		.route("/register", post(register_profile))
		.route("/login", post(login_profile))
		.route(
			"/logout",
			post(logout_profile).route_layer(AuthLayer::new(state.clone())),
		)
}

/// Profile routes
fn profile_routes(state: &AppState) -> Router<AppState> {
	Router::new()
		.route("/me", get(get_current_profile))
		.route_layer(AuthLayer::new(state.clone()))
}

/// Booking routes, every route needs a session and some need an admin
fn booking_routes(state: &AppState) -> Router<AppState> {
	let protected = Router::new()
		.route("/", get(get_all_bookings))
		.route("/{id}/status", patch(update_booking_status))
		.route("/{id}/check-in", patch(check_in))
		.route_layer(AdminLayer::new(state.clone()));

	Router::new()
		.route("/available-slots", get(get_available_slots))
		.route("/reserve", post(reserve_slot))
		.route("/me", get(get_own_bookings))
		.route("/{id}", get(get_booking))
		.route("/{id}/confirm-reservation", patch(confirm_reservation))
		.route("/{id}/cancel-reservation", patch(cancel_reservation))
		.route("/{id}/extend-reservation", patch(extend_reservation))
		.route("/{id}/retry-payment", patch(retry_payment))
		.route("/{id}/request-refund", patch(request_refund))
		.merge(protected)
		.route_layer(AuthLayer::new(state.clone()))
}
