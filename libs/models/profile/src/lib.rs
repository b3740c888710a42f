#[macro_use]
extern crate tracing;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::NaiveDateTime;
use common::{DbConn, Error, LoginError};
use db::profile;
use diesel::prelude::*;
use primitive_profile::PrimitiveProfile;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Profile {
	pub profile: PrimitiveProfile,
}

impl Profile {
	/// Get a [`Profile`] given its id
	#[instrument(skip(conn))]
	pub async fn get(query_id: i32, conn: &DbConn) -> Result<Self, Error> {
		let profile = conn
			.interact(move |conn| {
				use self::profile::dsl::*;

				profile
					.find(query_id)
					.select(PrimitiveProfile::as_select())
					.get_result(conn)
			})
			.await??;

		Ok(Self { profile })
	}

	/// Get a [`Profile`] given its username
	///
	/// An unknown username is reported as a login error
	#[instrument(skip(conn))]
	pub async fn get_by_username(
		query_username: String,
		conn: &DbConn,
	) -> Result<Self, Error> {
		let lookup = query_username.clone();

		let profile = conn
			.interact(move |conn| {
				use self::profile::dsl::*;

				profile
					.filter(username.eq(lookup))
					.select(PrimitiveProfile::as_select())
					.first(conn)
					.optional()
			})
			.await??;

		let Some(profile) = profile else {
			return Err(LoginError::UnknownUsername(query_username).into());
		};

		Ok(Self { profile })
	}

	/// Hash a password using Argon2
	pub fn hash_password(password: &str) -> Result<String, Error> {
		let salt = SaltString::generate(&mut OsRng);
		let hashed_password = Argon2::default()
			.hash_password(password.as_bytes(), &salt)?
			.to_string();

		Ok(hashed_password)
	}

	/// Check a password against the stored hash of this [`Profile`]
	pub fn verify_password(&self, password: &str) -> Result<(), Error> {
		let password_hash = PasswordHash::new(&self.profile.password_hash)?;

		Argon2::default().verify_password(password.as_bytes(), &password_hash)?;

		Ok(())
	}

	/// Update the latest login time of this [`Profile`] to `now`
	#[instrument(skip(conn))]
	pub async fn update_last_login(
		self,
		now: NaiveDateTime,
		conn: &DbConn,
	) -> Result<Self, Error> {
		let self_id = self.profile.id;

		let profile = conn
			.interact(move |conn| {
				use self::profile::dsl::*;

				diesel::update(profile.find(self_id))
					.set(last_login_at.eq(now))
					.returning(PrimitiveProfile::as_returning())
					.get_result(conn)
			})
			.await??;

		Ok(Self { profile })
	}
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct NewProfile {
	pub username: String,
	pub password: String,
	pub email:    String,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = profile)]
struct NewProfileHashed {
	username:      String,
	email:         String,
	password_hash: String,
}

impl NewProfile {
	/// Insert this [`NewProfile`]
	#[instrument(skip_all)]
	pub async fn insert(self, conn: &DbConn) -> Result<Profile, Error> {
		let hash = Profile::hash_password(&self.password)?;

		let insertable = NewProfileHashed {
			username:      self.username,
			email:         self.email,
			password_hash: hash,
		};

		let profile = conn
			.interact(|conn| {
				use self::profile::dsl::*;

				diesel::insert_into(profile)
					.values(insertable)
					.returning(PrimitiveProfile::as_returning())
					.get_result(conn)
			})
			.await??;

		info!("inserted new profile with id {}", profile.id);

		Ok(Profile { profile })
	}
}
