#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use liveroom_domain::{ChannelId, LiveRoom};

use crate::{Conn, StoreError};

#[async_trait::async_trait]
pub trait LiveRoomRepo: Send + Sync {
	/// `NoChannelCreated` when the id or the name is already taken.
	async fn create_live_room(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		name: &str,
		whiteboard_room_id: &str,
	) -> Result<LiveRoom, StoreError>;

	async fn get_by_name(&self, conn: &mut Conn, name: &str) -> Result<LiveRoom, StoreError>;

	async fn get_by_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoom, StoreError>;

	async fn end_live_room(&self, conn: &mut Conn, channel_id: &ChannelId, end_time: DateTime<Utc>) -> Result<(), StoreError>;

	async fn update_channel_room_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		whiteboard_room_id: &str,
	) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteLiveRoomRepo;

#[derive(sqlx::FromRow)]
struct LiveRoomRow {
	channel_id: String,
	channel_name: String,
	whiteboard_room_id: String,
	ended_at: Option<DateTime<Utc>>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl TryFrom<LiveRoomRow> for LiveRoom {
	type Error = StoreError;

	fn try_from(row: LiveRoomRow) -> Result<Self, Self::Error> {
		Ok(LiveRoom {
			channel_id: ChannelId::new(row.channel_id).map_err(|e| StoreError::invalid_row("live_room", e))?,
			channel_name: row.channel_name,
			whiteboard_room_id: row.whiteboard_room_id,
			ended_at: row.ended_at,
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

const SELECT_LIVE_ROOM: &str = "SELECT channel_id, channel_name, whiteboard_room_id, ended_at, created_at, updated_at \
	FROM live_room WHERE deleted_at IS NULL";

#[async_trait::async_trait]
impl LiveRoomRepo for SqliteLiveRoomRepo {
	async fn create_live_room(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		name: &str,
		whiteboard_room_id: &str,
	) -> Result<LiveRoom, StoreError> {
		if name.trim().is_empty() {
			return Err(StoreError::InvalidArgument("channel name must not be empty".to_string()));
		}

		let now = Utc::now();
		let result = sqlx::query(
			"INSERT INTO live_room (channel_id, channel_name, whiteboard_room_id, created_at, updated_at) \
			VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
		)
		.bind(channel_id.as_str())
		.bind(name)
		.bind(whiteboard_room_id)
		.bind(now)
		.bind(now)
		.execute(&mut *conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NoChannelCreated);
		}

		Ok(LiveRoom {
			channel_id: channel_id.clone(),
			channel_name: name.to_string(),
			whiteboard_room_id: whiteboard_room_id.to_string(),
			ended_at: None,
			created_at: now,
			updated_at: now,
		})
	}

	async fn get_by_name(&self, conn: &mut Conn, name: &str) -> Result<LiveRoom, StoreError> {
		let sql = format!("{SELECT_LIVE_ROOM} AND channel_name = ?");
		let row: Option<LiveRoomRow> = sqlx::query_as(&sql).bind(name).fetch_optional(&mut *conn).await?;
		row.ok_or(StoreError::ChannelNotFound)?.try_into()
	}

	async fn get_by_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoom, StoreError> {
		let sql = format!("{SELECT_LIVE_ROOM} AND channel_id = ?");
		let row: Option<LiveRoomRow> = sqlx::query_as(&sql)
			.bind(channel_id.as_str())
			.fetch_optional(&mut *conn)
			.await?;
		row.ok_or(StoreError::ChannelNotFound)?.try_into()
	}

	async fn end_live_room(&self, conn: &mut Conn, channel_id: &ChannelId, end_time: DateTime<Utc>) -> Result<(), StoreError> {
		let result = sqlx::query(
			"UPDATE live_room SET ended_at = ?, updated_at = ? WHERE channel_id = ? AND deleted_at IS NULL",
		)
		.bind(end_time)
		.bind(Utc::now())
		.bind(channel_id.as_str())
		.execute(&mut *conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NoChannelUpdated);
		}
		Ok(())
	}

	async fn update_channel_room_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		whiteboard_room_id: &str,
	) -> Result<(), StoreError> {
		let result = sqlx::query(
			"UPDATE live_room SET whiteboard_room_id = ?, updated_at = ? WHERE channel_id = ? AND deleted_at IS NULL",
		)
		.bind(whiteboard_room_id)
		.bind(Utc::now())
		.bind(channel_id.as_str())
		.execute(&mut *conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NoChannelUpdated);
		}
		Ok(())
	}
}
