//! Controllers for profiles

use axum::Json;
use axum::extract::State;
use common::{DbPool, Error};
use profile::Profile;

use crate::schemas::profile::ProfileResponse;
use crate::session::Session;

#[instrument(skip(pool))]
pub(crate) async fn get_current_profile(
	State(pool): State<DbPool>,
	session: Session,
) -> Result<Json<ProfileResponse>, Error> {
	let conn = pool.get().await?;
	let profile = Profile::get(session.data.profile_id, &conn).await?;

	Ok(Json(profile.into()))
}
