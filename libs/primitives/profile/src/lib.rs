use chrono::NaiveDateTime;
use db::profile;
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
	AsChangeset,
	Clone,
	Debug,
	Deserialize,
	Identifiable,
	Queryable,
	Selectable,
	Serialize,
)]
#[diesel(table_name = profile)]
#[diesel(check_for_backend(Pg))]
pub struct PrimitiveProfile {
	pub id:            i32,
	pub username:      String,
	pub email:         String,
	#[serde(skip)]
	pub password_hash: String,
	pub is_admin:      bool,
	pub created_at:    NaiveDateTime,
	pub updated_at:    NaiveDateTime,
	pub last_login_at: NaiveDateTime,
}
