use std::sync::LazyLock;

use common::{DbConn, DbPool};
use deadpool_diesel::postgres::{Manager, Pool};
use diesel::prelude::*;
use diesel_migrations::{
	EmbeddedMigrations,
	MigrationHarness,
	embed_migrations,
};
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// Global test database provider
pub static DATABASE_PROVIDER: LazyLock<DatabaseProvider> =
	LazyLock::new(DatabaseProvider::new);

/// A RAII guard provider which generates temporary test databases
pub struct DatabaseProvider {
	base_url:  String,
	root_pool: DbPool,
}

/// A test database RAII guard, the database is dropped with the guard
pub struct DatabaseGuard {
	root_conn:     DbConn,
	database_name: String,
	database_url:  String,
}

fn build_pool(url: String) -> DbPool {
	let manager = Manager::new(url, deadpool_diesel::Runtime::Tokio1);

	Pool::builder(manager).build().unwrap()
}

/// Run a statement on the root connection, outside of any test database
async fn run_on_root(conn: &DbConn, statement: String) {
	conn.interact(move |conn| diesel::sql_query(statement).execute(conn))
		.await
		.expect("could not interact with root connection")
		.expect("could not run statement on root connection");
}

impl DatabaseProvider {
	fn new() -> Self {
		if Ok("true".to_string()) == std::env::var("CI") {
			tracing_subscriber::fmt()
				.pretty()
				.with_thread_names(true)
				.with_max_level(tracing::Level::DEBUG)
				.init();
		}

		let database_url = std::env::var("DATABASE_URL").unwrap();
		let (base_url, _) = database_url.rsplit_once('/').unwrap();

		Self {
			base_url:  base_url.to_string(),
			root_pool: build_pool(database_url.clone()),
		}
	}

	/// Acquire a new [`DatabaseGuard`] for accessing a temporary test database
	///
	/// # Panics
	/// Panics if creating a database fails
	pub(crate) async fn acquire(&self) -> DatabaseGuard {
		let database_name = format!("test_{}", Uuid::new_v4().simple());
		let database_url = format!("{}/{}", self.base_url, database_name);

		let root_conn = self
			.root_pool
			.get()
			.await
			.expect("could not get root pool connection");

		run_on_root(&root_conn, format!("CREATE DATABASE {database_name};"))
			.await;

		DatabaseGuard { root_conn, database_name, database_url }
	}
}

impl DatabaseGuard {
	/// Create a new migrated database pool for this test database
	///
	/// # Panics
	/// Panics if creation or migration fails
	pub async fn create_pool(&self) -> DbPool {
		let pool = build_pool(self.database_url.clone());

		let conn = pool.get().await.unwrap();
		conn.interact(|conn| conn.run_pending_migrations(MIGRATIONS).map(|_| ()))
			.await
			.unwrap()
			.unwrap();

		pool
	}
}

impl Drop for DatabaseGuard {
	fn drop(&mut self) {
		let drop_db_query =
			format!("DROP DATABASE {} WITH (FORCE);", self.database_name);

		futures::executor::block_on(run_on_root(&self.root_conn, drop_db_query));
	}
}
