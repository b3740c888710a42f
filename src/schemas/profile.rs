use chrono::NaiveDateTime;
use primitive_profile::PrimitiveProfile;
use profile::Profile;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
	pub id:            i32,
	pub username:      String,
	pub email:         String,
	pub is_admin:      bool,
	pub created_at:    NaiveDateTime,
	pub last_login_at: NaiveDateTime,
}

impl From<PrimitiveProfile> for ProfileResponse {
	fn from(profile: PrimitiveProfile) -> Self {
		Self {
			id:            profile.id,
			username:      profile.username,
			email:         profile.email,
			is_admin:      profile.is_admin,
			created_at:    profile.created_at,
			last_login_at: profile.last_login_at,
		}
	}
}

impl From<Profile> for ProfileResponse {
	fn from(value: Profile) -> Self { value.profile.into() }
}
