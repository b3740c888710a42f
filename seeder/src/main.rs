mod util;

use std::env;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};
use clap::{Error, Parser};
use common::DbConn;
use db::BookingStatus;
use deadpool_diesel::postgres::{Manager, Pool};
use diesel::pg::Pg;
use diesel::prelude::*;
use fake::Fake;
use fake::faker::internet::raw::{FreeEmail, Username};
use fake::locales::EN;
use lifecycle::{DEFAULT_TIME_SLOTS, MAX_GROUP_SIZE, MIN_GROUP_SIZE};
use profile::Profile;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, rng};
use uuid::Uuid;

use crate::util::{batch_insert, generate_unique_set, io_error};

/// Statuses seeded bookings are spread over, all of them are settled so no
/// hold has to be kept consistent with the seeding time
const SEED_STATUSES: [BookingStatus; 5] = [
	BookingStatus::AwaitingPayment,
	BookingStatus::Paid,
	BookingStatus::Confirmed,
	BookingStatus::Cancelled,
	BookingStatus::Refunded,
];

#[derive(Parser, Debug)]
struct Opt {
	#[arg(long, short = 'p', default_value_t = 1_000)]
	profiles: usize,
	/// Number of days, starting tomorrow, to fill with bookings
	#[arg(long, short = 'd', default_value_t = 30)]
	days:     u32,
	/// Places per time slot, should match `SLOT_CAPACITY` of the server
	#[arg(long, short = 'c', default_value_t = 20)]
	capacity: usize,
	/// Password every seeded profile logs in with
	#[arg(long, default_value = "foobarbazqux")]
	password: String,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = db::profile)]
#[diesel(check_for_backend(Pg))]
struct SeedProfile {
	username:      String,
	email:         String,
	password_hash: String,
}

#[derive(Clone, Debug, Insertable)]
#[diesel(table_name = db::booking)]
#[diesel(check_for_backend(Pg))]
struct SeedBooking {
	id:         Uuid,
	profile_id: i32,
	date:       NaiveDate,
	time_slot:  String,
	group_size: i32,
	status:     BookingStatus,
	deposit:    i32,
	created_at: NaiveDateTime,
	updated_at: NaiveDateTime,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
	let cli = Opt::parse();
	let conn = get_conn().await;

	if cli.profiles > 0 {
		println!("Seeding {} profiles…", cli.profiles);
		let inserted = seed_profiles(&conn, cli.profiles, &cli.password).await?;
		println!("Inserted {inserted} unique profiles");
	}

	if cli.days > 0 {
		println!("Seeding bookings for {} days…", cli.days);
		let inserted = seed_bookings(&conn, cli.days, cli.capacity).await?;
		println!("Inserted {inserted} bookings");
	}

	Ok(())
}

/// Get a database connection from the pool
async fn get_conn() -> DbConn {
	let database_url = env::var("DATABASE_URL").expect("DATABASE_URL missing");

	let manager = Manager::new(database_url, deadpool_diesel::Runtime::Tokio1);
	let pool = Pool::builder(manager).build().expect("Failed to create pool");

	pool.get().await.expect("Failed to get a database connection")
}

/// Seed profiles with unique usernames and emails
///
/// Hashing is slow so every profile shares a single hash of `password`
async fn seed_profiles(
	conn: &DbConn,
	count: usize,
	password: &str,
) -> Result<usize, Error> {
	let password_hash = Profile::hash_password(password).map_err(io_error)?;

	let usernames =
		generate_unique_set(count, || Username(EN).fake::<String>());
	let emails = generate_unique_set(count, || FreeEmail(EN).fake::<String>());

	let profiles: Vec<SeedProfile> = usernames
		.into_iter()
		.zip(emails)
		.map(|(username, email)| {
			SeedProfile { username, email, password_hash: password_hash.clone() }
		})
		.collect();

	batch_insert(conn, profiles, 8192, |conn, chunk| {
		use db::profile::dsl::*;
		diesel::insert_into(profile).values(chunk).execute(conn)
	})
	.await
}

/// Seed bookings for the coming `days`
///
/// Every slot gets at most `capacity` bookings and a profile books a slot
/// at most once, so the seeded data never oversells a slot.
async fn seed_bookings(
	conn: &DbConn,
	days: u32,
	capacity: usize,
) -> Result<usize, Error> {
	let mut profile_ids: Vec<i32> = conn
		.interact(|c| {
			use db::profile::dsl::*;
			profile.filter(is_admin.eq(false)).select(id).load::<i32>(c)
		})
		.await
		.map_err(io_error)?
		.map_err(io_error)?;

	assert!(!profile_ids.is_empty(), "No profiles exist to book tours for");

	let now = Utc::now().naive_utc();
	let tomorrow = now.date() + TimeDelta::days(1);

	let mut rng = rng();
	let mut bookings = vec![];

	for day in 0..days {
		let date = tomorrow + TimeDelta::days(i64::from(day));

		for slot in DEFAULT_TIME_SLOTS {
			let max = capacity.min(profile_ids.len());
			let taken = rng.random_range(0..=max);

			profile_ids.shuffle(&mut rng);

			for &profile_id in &profile_ids[..taken] {
				let status = *SEED_STATUSES.choose(&mut rng).unwrap();
				let created_at =
					now - TimeDelta::minutes(rng.random_range(0..10_000));

				bookings.push(SeedBooking {
					id: Uuid::new_v4(),
					profile_id,
					date,
					time_slot: slot.to_string(),
					group_size: rng.random_range(MIN_GROUP_SIZE..=MAX_GROUP_SIZE),
					status,
					deposit: rng.random_range(10..100) * 100,
					created_at,
					updated_at: created_at,
				});
			}
		}
	}

	batch_insert(conn, bookings, 2 << 10, |conn, chunk| {
		use db::booking::dsl::*;
		diesel::insert_into(booking).values(chunk).execute(conn)
	})
	.await
}
