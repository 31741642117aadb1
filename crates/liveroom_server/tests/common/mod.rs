#![forbid(unsafe_code)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use liveroom_domain::{
	ChannelId, CurrentMaterial, LiveRoomMemberState, LiveRoomState, MemberStateType, PollingOption, PollingOptions,
	UserId,
};
use liveroom_server::{Command, CommandAction, Dispatcher, LiveRoomService, LocalWhiteboard, Repositories};
use liveroom_store::{
	Conn, DatabaseSettings, LiveRoomStateRepo, SqliteStateRepo, StateField, StoreError, StudentsRepo,
};
use sqlx::SqlitePool;

pub const TEACHER: &str = "teacher-1";

static LOG_INIT: OnceLock<()> = OnceLock::new();

pub fn init_test_logging() {
	LOG_INIT.get_or_init(|| {
		if std::env::var_os("LIVEROOM_TEST_LOG").is_none() {
			return;
		}

		let _ = tracing_subscriber::fmt()
			.with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
			.with_target(false)
			.try_init();
	});
}

pub fn user(id: &str) -> UserId {
	UserId::new(id).expect("valid user id")
}

pub fn channel(id: &str) -> ChannelId {
	ChannelId::new(id).expect("valid channel id")
}

pub fn teacher() -> UserId {
	user(TEACHER)
}

pub struct Harness {
	pub pool: SqlitePool,
	pub dispatcher: Arc<Dispatcher>,
	pub service: Arc<LiveRoomService>,
	pub whiteboard: Arc<LocalWhiteboard>,
	_dir: Option<tempfile::TempDir>,
}

pub struct HarnessOptions {
	pub repos: Repositories,
	pub maximum_learner_streamings: u32,
	pub command_timeout: Duration,
	pub students: Vec<&'static str>,
	/// File-backed WAL database with a multi-connection pool instead of the
	/// single-connection in-memory one.
	pub on_disk: bool,
}

impl Default for HarnessOptions {
	fn default() -> Self {
		Self {
			repos: Repositories::sqlite(),
			maximum_learner_streamings: 5,
			command_timeout: Duration::from_secs(5),
			students: vec!["s1", "s2", "s3", "s4"],
			on_disk: false,
		}
	}
}

pub async fn setup() -> Harness {
	setup_with(HarnessOptions::default()).await
}

pub async fn setup_with(options: HarnessOptions) -> Harness {
	init_test_logging();

	let (pool, dir) = if options.on_disk {
		let dir = tempfile::tempdir().expect("tempdir");
		let settings = DatabaseSettings {
			url: format!("sqlite://{}", dir.path().join("liveroom.db").display()),
			max_connections: 8,
			..DatabaseSettings::default()
		};
		let pool = liveroom_store::connect(&settings).await.expect("file db");
		(pool, Some(dir))
	} else {
		(liveroom_store::connect_in_memory().await.expect("in-memory db"), None)
	};
	{
		let mut conn = pool.acquire().await.expect("acquire");
		for id in &options.students {
			options.repos.students.add_student(&mut *conn, &user(id)).await.expect("seed student");
		}
	}

	let dispatcher = Arc::new(Dispatcher::new(pool.clone(), options.repos, options.command_timeout));
	let whiteboard = Arc::new(LocalWhiteboard::new());
	let service = Arc::new(LiveRoomService::new(
		dispatcher.clone(),
		whiteboard.clone(),
		options.maximum_learner_streamings,
	));

	Harness {
		pool,
		dispatcher,
		service,
		whiteboard,
		_dir: dir,
	}
}

impl Harness {
	pub async fn run(&self, commander: &UserId, channel_id: &ChannelId, action: CommandAction) -> Result<(), liveroom_server::CommandError> {
		let command = Command::new(commander.clone(), channel_id.clone(), action);
		self.dispatcher.check_permission_and_dispatch(&command).await
	}

	pub async fn teacher_runs(&self, channel_id: &ChannelId, action: CommandAction) {
		let name = action.name();
		self.run(&teacher(), channel_id, action)
			.await
			.unwrap_or_else(|e| panic!("{name} failed: {e}"));
	}

	pub async fn state(&self, channel_id: &ChannelId) -> LiveRoomState {
		self.service
			.get_live_room_state(channel_id)
			.await
			.expect("read state")
			.state
	}

	pub async fn members(&self, channel_id: &ChannelId, state_type: MemberStateType) -> Vec<LiveRoomMemberState> {
		let mut members: Vec<_> = self
			.service
			.get_live_room_state(channel_id)
			.await
			.expect("read state")
			.member_states
			.into_iter()
			.filter(|m| m.state_type == state_type)
			.collect();
		members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
		members
	}
}

pub fn abc_options() -> PollingOptions {
	PollingOptions::new(vec![
		PollingOption::new("A", true).with_content("first"),
		PollingOption::new("B", false).with_content("second"),
		PollingOption::new("C", false).with_content("third"),
	])
}

pub fn start_polling() -> CommandAction {
	CommandAction::StartPolling {
		options: abc_options(),
		question: "Which one?".to_string(),
	}
}

pub fn submit(user_id: &str, answers: &[&str]) -> CommandAction {
	CommandAction::SubmitPollingAnswer {
		user_id: user(user_id),
		answers: answers.iter().map(|a| a.to_string()).collect(),
	}
}

pub fn share_material(media_id: &str) -> CommandAction {
	CommandAction::ShareMaterial {
		material: CurrentMaterial::new(media_id, Utc::now()),
	}
}

pub fn injected() -> StoreError {
	StoreError::Database(sqlx::Error::Protocol("injected failure".to_string()))
}

pub const SLOW_READ: Duration = Duration::from_secs(2);

/// State repository that delegates to SQLite, with switchable faults on
/// `get_state_by_channel_id`.
#[derive(Default)]
pub struct FaultyStateRepo {
	inner: SqliteStateRepo,
	fail_reads: AtomicBool,
	slow_reads: AtomicBool,
}

impl FaultyStateRepo {
	pub fn fail_reads(&self, fail: bool) {
		self.fail_reads.store(fail, Ordering::SeqCst);
	}

	/// Reads sleep for [`SLOW_READ`] first.
	pub fn slow_reads(&self, slow: bool) {
		self.slow_reads.store(slow, Ordering::SeqCst);
	}
}

#[async_trait::async_trait]
impl LiveRoomStateRepo for FaultyStateRepo {
	async fn get_state_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomState, StoreError> {
		if self.slow_reads.load(Ordering::SeqCst) {
			tokio::time::sleep(SLOW_READ).await;
		}
		if self.fail_reads.load(Ordering::SeqCst) {
			return Err(injected());
		}
		self.inner.get_state_by_channel_id(conn, channel_id).await
	}

	async fn upsert_state(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		field: StateField,
		value: Option<serde_json::Value>,
	) -> Result<(), StoreError> {
		self.inner.upsert_state(conn, channel_id, field, value).await
	}

	async fn get_streaming_learners(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		lock_for_update: bool,
	) -> Result<Vec<UserId>, StoreError> {
		self.inner.get_streaming_learners(conn, channel_id, lock_for_update).await
	}

	async fn increase_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
		max: u32,
	) -> Result<(), StoreError> {
		self.inner.increase_number_of_streaming(conn, channel_id, learner, max).await
	}

	async fn decrease_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
	) -> Result<(), StoreError> {
		self.inner.decrease_number_of_streaming(conn, channel_id, learner).await
	}
}

/// State repository whose reads return the first state it ever observed for
/// a channel, as a concurrent reader that raced ahead of a writer would.
#[derive(Default)]
pub struct SnapshotStateRepo {
	inner: SqliteStateRepo,
	frozen: tokio::sync::Mutex<Option<LiveRoomState>>,
	freeze: AtomicBool,
}

impl SnapshotStateRepo {
	/// Subsequent reads return the next observed state forever.
	pub fn freeze(&self) {
		self.freeze.store(true, Ordering::SeqCst);
	}
}

#[async_trait::async_trait]
impl LiveRoomStateRepo for SnapshotStateRepo {
	async fn get_state_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomState, StoreError> {
		if !self.freeze.load(Ordering::SeqCst) {
			return self.inner.get_state_by_channel_id(conn, channel_id).await;
		}

		let mut frozen = self.frozen.lock().await;
		if let Some(state) = frozen.as_ref() {
			return Ok(state.clone());
		}
		let state = self.inner.get_state_by_channel_id(conn, channel_id).await?;
		*frozen = Some(state.clone());
		Ok(state)
	}

	async fn upsert_state(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		field: StateField,
		value: Option<serde_json::Value>,
	) -> Result<(), StoreError> {
		self.inner.upsert_state(conn, channel_id, field, value).await
	}

	async fn get_streaming_learners(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		lock_for_update: bool,
	) -> Result<Vec<UserId>, StoreError> {
		self.inner.get_streaming_learners(conn, channel_id, lock_for_update).await
	}

	async fn increase_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
		max: u32,
	) -> Result<(), StoreError> {
		self.inner.increase_number_of_streaming(conn, channel_id, learner, max).await
	}

	async fn decrease_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
	) -> Result<(), StoreError> {
		self.inner.decrease_number_of_streaming(conn, channel_id, learner).await
	}
}

pub fn approx_now(at: DateTime<Utc>) -> bool {
	(Utc::now() - at).num_seconds().abs() < 60
}
