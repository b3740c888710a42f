//! Controllers for authorization

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::NoContent;
use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::Cookie;
use common::{DbPool, Error, RedisConn};
use profile::{NewProfile, Profile};
use validator::Validate;

use crate::schemas::auth::{LoginRequest, RegisterRequest};
use crate::schemas::profile::ProfileResponse;
use crate::session::Session;
use crate::{Config, SharedClock};

/// Store a new session for `profile` and add its access token to the jar
async fn start_session(
	config: &Config,
	profile: &Profile,
	jar: PrivateCookieJar,
	r_conn: &mut RedisConn,
) -> Result<PrivateCookieJar, Error> {
	let session =
		Session::create(config.access_token_lifetime, &profile.profile, r_conn)
			.await?;

	let access_token_cookie = session.to_access_token_cookie(
		config.access_token_name.clone(),
		config.access_token_lifetime,
		config.production,
	);

	Ok(jar.add(access_token_cookie))
}

#[instrument(skip_all)]
pub(crate) async fn register_profile(
	State(pool): State<DbPool>,
	State(mut r_conn): State<RedisConn>,
	State(config): State<Config>,
	jar: PrivateCookieJar,
	Json(register_data): Json<RegisterRequest>,
) -> Result<(StatusCode, PrivateCookieJar, Json<ProfileResponse>), Error> {
	register_data.validate()?;

	let new_profile = NewProfile {
		username: register_data.username,
		password: register_data.password,
		email:    register_data.email,
	};

	let conn = pool.get().await?;
	let profile = new_profile.insert(&conn).await?;

	let jar = start_session(&config, &profile, jar, &mut r_conn).await?;

	info!(
		"registered new profile id: {} username: {}",
		profile.profile.id, profile.profile.username,
	);

	Ok((StatusCode::CREATED, jar, Json(profile.into())))
}

#[instrument(skip_all)]
pub(crate) async fn login_profile(
	State(pool): State<DbPool>,
	State(mut r_conn): State<RedisConn>,
	State(config): State<Config>,
	State(clock): State<SharedClock>,
	jar: PrivateCookieJar,
	Json(login_data): Json<LoginRequest>,
) -> Result<(PrivateCookieJar, NoContent), Error> {
	let conn = pool.get().await?;
	let profile = Profile::get_by_username(login_data.username, &conn).await?;

	profile.verify_password(&login_data.password)?;

	let jar = start_session(&config, &profile, jar, &mut r_conn).await?;

	let profile = profile.update_last_login(clock.now(), &conn).await?;

	info!("logged in profile {}", profile.profile.id);

	Ok((jar, NoContent))
}

#[instrument(skip(r_conn, config, jar))]
pub(crate) async fn logout_profile(
	State(mut r_conn): State<RedisConn>,
	State(config): State<Config>,
	session: Session,
	jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, NoContent), Error> {
	Session::delete(session.id, &mut r_conn).await?;

	let access_token = Cookie::build(config.access_token_name).path("/");
	let jar = jar.remove(access_token);

	info!("logged out profile {}", session.data.profile_id);

	Ok((jar, NoContent))
}
