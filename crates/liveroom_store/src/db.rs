#![forbid(unsafe_code)]

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

use crate::StoreError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("migrations/sqlite");

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
	/// `sqlite:` URL.
	pub url: String,
	pub max_connections: u32,
	/// How long a writer waits on a locked database before failing.
	pub busy_timeout: Duration,
}

impl Default for DatabaseSettings {
	fn default() -> Self {
		Self {
			url: "sqlite://liveroom.db?mode=rwc".to_string(),
			max_connections: 5,
			busy_timeout: Duration::from_secs(5),
		}
	}
}

/// Open a pool and apply the embedded migrations.
pub async fn connect(settings: &DatabaseSettings) -> Result<SqlitePool, StoreError> {
	if !settings.url.starts_with("sqlite:") {
		return Err(StoreError::InvalidArgument(format!(
			"unsupported database url {:?} (expected sqlite:)",
			settings.url
		)));
	}

	let options = SqliteConnectOptions::from_str(&settings.url)?
		.create_if_missing(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(settings.busy_timeout)
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(settings.max_connections.max(1))
		.connect_with(options)
		.await?;

	run_migrations(&pool).await?;
	info!(max_connections = settings.max_connections, "sqlite pool ready");
	Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
///
/// The pool holds exactly one connection for its lifetime, so the database
/// survives between acquisitions.
pub async fn connect_in_memory() -> Result<SqlitePool, StoreError> {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.min_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect_with(options)
		.await?;

	run_migrations(&pool).await?;
	Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
	MIGRATOR
		.run(pool)
		.await
		.map_err(|e| StoreError::Database(sqlx::Error::Migrate(Box::new(e))))
}
