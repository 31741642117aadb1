#![forbid(unsafe_code)]

use std::future::Future;
use std::time::{Duration, Instant};

use liveroom_store::{Conn, LogCounter};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{CommandError, db_err, store_err};
use crate::handlers;
use crate::permission::PermissionChecker;
use crate::repos::Repositories;

/// Runs commands against the store, one transaction per top-level call.
pub struct Dispatcher {
	pool: SqlitePool,
	repos: Repositories,
	checker: PermissionChecker,
	command_timeout: Duration,
}

impl Dispatcher {
	pub fn new(pool: SqlitePool, repos: Repositories, command_timeout: Duration) -> Self {
		let checker = PermissionChecker::new(repos.students.clone());
		Self {
			pool,
			repos,
			checker,
			command_timeout,
		}
	}

	pub fn repos(&self) -> &Repositories {
		&self.repos
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub fn checker(&self) -> &PermissionChecker {
		&self.checker
	}

	pub fn command_timeout(&self) -> Duration {
		self.command_timeout
	}

	/// Run `command` in its own transaction.
	pub async fn dispatch(&self, command: &Command) -> Result<(), CommandError> {
		self.run(command, false).await
	}

	/// Permission check and handler share one transaction.
	pub async fn check_permission_and_dispatch(&self, command: &Command) -> Result<(), CommandError> {
		self.run(command, true).await
	}

	/// Run `command` on a connection the caller already holds inside a
	/// transaction. Nothing is committed or rolled back here.
	pub async fn dispatch_with_transaction(&self, conn: &mut Conn, command: &Command) -> Result<(), CommandError> {
		let handler = handlers::resolve(self, command);
		handler.execute(conn).await
	}

	/// Takes the write lock up front so concurrent writers queue on
	/// `busy_timeout`. A deferred read-then-write upgrade fails with
	/// `SQLITE_BUSY` instead of waiting.
	pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, CommandError> {
		self.pool
			.begin_with("BEGIN IMMEDIATE")
			.await
			.map_err(db_err("pool.begin"))
	}

	/// Commit on `Ok`, roll back on `Err`. The original error wins over a
	/// failed rollback.
	pub async fn finish<T>(
		&self,
		tx: Transaction<'static, Sqlite>,
		result: Result<T, CommandError>,
	) -> Result<T, CommandError> {
		match result {
			Ok(value) => {
				tx.commit().await.map_err(db_err("transaction.commit"))?;
				Ok(value)
			}
			Err(e) => {
				if let Err(rollback) = tx.rollback().await {
					warn!(error = %rollback, "transaction rollback failed");
				}
				Err(e)
			}
		}
	}

	/// Bound `fut` by the command timeout. On expiry the future is dropped,
	/// and with it any open transaction.
	pub async fn with_deadline<T, F>(&self, fut: F) -> Result<T, CommandError>
	where
		F: Future<Output = Result<T, CommandError>>,
	{
		match tokio::time::timeout(self.command_timeout, fut).await {
			Ok(result) => result,
			Err(_) => Err(CommandError::DeadlineExceeded(self.command_timeout)),
		}
	}

	async fn run(&self, command: &Command, check_permission: bool) -> Result<(), CommandError> {
		let name = command.name();
		let started = Instant::now();
		metrics::counter!("liveroom_commands_total", "command" => name).increment(1);

		let result = self
			.with_deadline(self.run_in_transaction(command, check_permission))
			.await
			.map_err(|e| e.in_command(command));

		metrics::histogram!("liveroom_command_duration_seconds", "command" => name)
			.record(started.elapsed().as_secs_f64());

		match &result {
			Ok(()) => {
				debug!(
					command = name,
					channel_id = %command.channel_id,
					commander_id = %command.commander_id,
					"command applied"
				);
				self.count_in_session_log(command).await;
			}
			Err(e) if e.is_permission_denied() => {}
			Err(e) => {
				metrics::counter!("liveroom_command_errors_total", "command" => name).increment(1);
				warn!(
					command = name,
					channel_id = %command.channel_id,
					commander_id = %command.commander_id,
					error = %e,
					"command failed"
				);
			}
		}
		result
	}

	/// Runs after commit; a failure here never undoes the command.
	async fn count_in_session_log(&self, command: &Command) {
		let result = async {
			let mut conn = self.pool.acquire().await.map_err(db_err("pool.acquire"))?;
			self.repos
				.live_room_log
				.increase_total_times_by_channel_id(&mut *conn, &command.channel_id, LogCounter::UpdatingRoomState)
				.await
				.map_err(store_err("live_room_log.increase_total_times_by_channel_id"))
		}
		.await;

		if let Err(e) = result {
			warn!(command = command.name(), channel_id = %command.channel_id, error = %e, "session log not updated");
		}
	}

	async fn run_in_transaction(&self, command: &Command, check_permission: bool) -> Result<(), CommandError> {
		let mut tx = self.begin().await?;
		let result = self.apply(&mut *tx, command, check_permission).await;
		self.finish(tx, result).await
	}

	async fn apply(&self, conn: &mut Conn, command: &Command, check_permission: bool) -> Result<(), CommandError> {
		if check_permission {
			self.checker.check(conn, command).await?;
		}
		self.dispatch_with_transaction(conn, command).await
	}
}
