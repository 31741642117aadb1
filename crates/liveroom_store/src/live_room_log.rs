#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use liveroom_domain::{ChannelId, UserId};
use sqlx::types::Json;

use crate::{Conn, StoreError};

/// Per-session counters kept on the channel's open log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCounter {
	GettingRoomState,
	UpdatingRoomState,
}

impl LogCounter {
	pub const fn column(self) -> &'static str {
		match self {
			LogCounter::GettingRoomState => "total_times_getting_room_state",
			LogCounter::UpdatingRoomState => "total_times_updating_room_state",
		}
	}
}

/// One session of a channel, from the first join until the room ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRoomLog {
	pub log_id: String,
	pub channel_id: ChannelId,
	pub is_completed: bool,
	pub attendee_ids: Vec<UserId>,
	pub total_times_getting_room_state: i64,
	pub total_times_updating_room_state: i64,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// Writes other than `create` target the latest uncompleted log of the channel
/// and are no-ops when there is none.
#[async_trait::async_trait]
pub trait LiveRoomLogRepo: Send + Sync {
	async fn create(&self, conn: &mut Conn, channel_id: &ChannelId, attendee_ids: &[UserId]) -> Result<LiveRoomLog, StoreError>;

	/// Fails with `ChannelNotFound` when the channel has never been logged.
	async fn get_latest_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomLog, StoreError>;

	/// Appends `user_id` unless it is already an attendee.
	async fn add_attendee_id_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_id: &UserId,
	) -> Result<(), StoreError>;

	async fn increase_total_times_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		counter: LogCounter,
	) -> Result<(), StoreError>;

	async fn complete_log_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<(), StoreError>;
}

/// Subquery selecting the open log of the channel bound at `channel_param`.
fn open_log(channel_param: &str) -> String {
	format!(
		"SELECT log_id FROM live_room_log \
		WHERE channel_id = {channel_param} AND is_completed = 0 AND deleted_at IS NULL \
		ORDER BY rowid DESC LIMIT 1"
	)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteLiveRoomLogRepo;

#[async_trait::async_trait]
impl LiveRoomLogRepo for SqliteLiveRoomLogRepo {
	async fn create(&self, conn: &mut Conn, channel_id: &ChannelId, attendee_ids: &[UserId]) -> Result<LiveRoomLog, StoreError> {
		let now = Utc::now();
		let log = LiveRoomLog {
			log_id: uuid::Uuid::new_v4().to_string(),
			channel_id: channel_id.clone(),
			is_completed: false,
			attendee_ids: attendee_ids.to_vec(),
			total_times_getting_room_state: 0,
			total_times_updating_room_state: 0,
			created_at: now,
			updated_at: now,
		};

		sqlx::query(
			"INSERT INTO live_room_log (log_id, channel_id, is_completed, attendee_ids, created_at, updated_at) \
			VALUES (?, ?, 0, ?, ?, ?)",
		)
		.bind(&log.log_id)
		.bind(channel_id.as_str())
		.bind(serde_json::to_string(&log.attendee_ids)?)
		.bind(now)
		.bind(now)
		.execute(&mut *conn)
		.await?;

		Ok(log)
	}

	async fn get_latest_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomLog, StoreError> {
		type Row = (String, bool, Json<Vec<UserId>>, i64, i64, DateTime<Utc>, DateTime<Utc>);

		let row: Option<Row> = sqlx::query_as(
			"SELECT log_id, is_completed, attendee_ids, total_times_getting_room_state, \
			total_times_updating_room_state, created_at, updated_at FROM live_room_log \
			WHERE channel_id = ? AND deleted_at IS NULL ORDER BY rowid DESC LIMIT 1",
		)
		.bind(channel_id.as_str())
		.fetch_optional(&mut *conn)
		.await?;

		let (log_id, is_completed, attendee_ids, getting, updating, created_at, updated_at) =
			row.ok_or(StoreError::ChannelNotFound)?;
		Ok(LiveRoomLog {
			log_id,
			channel_id: channel_id.clone(),
			is_completed,
			attendee_ids: attendee_ids.0,
			total_times_getting_room_state: getting,
			total_times_updating_room_state: updating,
			created_at,
			updated_at,
		})
	}

	async fn add_attendee_id_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_id: &UserId,
	) -> Result<(), StoreError> {
		let sql = format!(
			"UPDATE live_room_log SET attendee_ids = json_insert(attendee_ids, '$[#]', ?1), updated_at = ?2 \
			WHERE log_id = ({}) \
			AND NOT EXISTS (SELECT 1 FROM json_each(live_room_log.attendee_ids) WHERE json_each.value = ?1)",
			open_log("?3")
		);
		sqlx::query(&sql)
			.bind(user_id.as_str())
			.bind(Utc::now())
			.bind(channel_id.as_str())
			.execute(&mut *conn)
			.await?;
		Ok(())
	}

	async fn increase_total_times_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		counter: LogCounter,
	) -> Result<(), StoreError> {
		let column = counter.column();
		let sql = format!(
			"UPDATE live_room_log SET {column} = {column} + 1, updated_at = ?1 WHERE log_id = ({})",
			open_log("?2")
		);
		sqlx::query(&sql)
			.bind(Utc::now())
			.bind(channel_id.as_str())
			.execute(&mut *conn)
			.await?;
		Ok(())
	}

	async fn complete_log_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<(), StoreError> {
		sqlx::query(
			"UPDATE live_room_log SET is_completed = 1, updated_at = ? \
			WHERE channel_id = ? AND is_completed = 0 AND deleted_at IS NULL",
		)
		.bind(Utc::now())
		.bind(channel_id.as_str())
		.execute(&mut *conn)
		.await?;
		Ok(())
	}
}
