#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use liveroom_domain::{ChannelId, CurrentMaterial, CurrentPolling, LiveRoomState, Recording, UserId, WhiteboardZoomState};
use sqlx::types::Json;
use tracing::debug;

use crate::{Conn, StoreError};

/// Per-field columns of `live_room_state`. Each holds a JSON document or NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
	CurrentMaterial,
	SpotlightedUser,
	WhiteboardZoomState,
	Recording,
	CurrentPolling,
	SessionTime,
}

impl StateField {
	pub const fn column(self) -> &'static str {
		match self {
			StateField::CurrentMaterial => "current_material",
			StateField::SpotlightedUser => "spotlighted_user",
			StateField::WhiteboardZoomState => "whiteboard_zoom_state",
			StateField::Recording => "recording",
			StateField::CurrentPolling => "current_polling",
			StateField::SessionTime => "session_time",
		}
	}
}

#[async_trait::async_trait]
pub trait LiveRoomStateRepo: Send + Sync {
	/// Fails with `ChannelNotFound` when the channel has no state row yet.
	async fn get_state_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomState, StoreError>;

	/// Replace one field with `value` (NULL when `None`). Creates the row if
	/// missing, clears any soft-delete marker and bumps `updated_at`.
	async fn upsert_state(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		field: StateField,
		value: Option<serde_json::Value>,
	) -> Result<(), StoreError>;

	async fn get_streaming_learners(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		lock_for_update: bool,
	) -> Result<Vec<UserId>, StoreError>;

	/// Admit `learner` as a publisher if the channel is below `max` and the
	/// learner is not already publishing. `NoChannelUpdated` otherwise.
	async fn increase_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
		max: u32,
	) -> Result<(), StoreError>;

	/// `NoChannelUpdated` if the learner is not publishing.
	async fn decrease_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
	) -> Result<(), StoreError>;

	async fn upsert_current_polling(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		polling: Option<&CurrentPolling>,
	) -> Result<(), StoreError> {
		let value = polling.map(serde_json::to_value).transpose()?;
		self.upsert_state(conn, channel_id, StateField::CurrentPolling, value).await
	}

	async fn upsert_current_material(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		material: Option<&CurrentMaterial>,
	) -> Result<(), StoreError> {
		let value = material.map(serde_json::to_value).transpose()?;
		self.upsert_state(conn, channel_id, StateField::CurrentMaterial, value).await
	}

	async fn spotlight(&self, conn: &mut Conn, channel_id: &ChannelId, user_id: &UserId) -> Result<(), StoreError> {
		let value = serde_json::to_value(user_id)?;
		self.upsert_state(conn, channel_id, StateField::SpotlightedUser, Some(value))
			.await
	}

	async fn un_spotlight(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<(), StoreError> {
		self.upsert_state(conn, channel_id, StateField::SpotlightedUser, None).await
	}

	async fn upsert_whiteboard_zoom_state(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		zoom: &WhiteboardZoomState,
	) -> Result<(), StoreError> {
		let value = serde_json::to_value(zoom)?;
		self.upsert_state(conn, channel_id, StateField::WhiteboardZoomState, Some(value))
			.await
	}

	async fn upsert_recording(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		recording: Option<&Recording>,
	) -> Result<(), StoreError> {
		let value = recording.map(serde_json::to_value).transpose()?;
		self.upsert_state(conn, channel_id, StateField::Recording, value).await
	}

	async fn upsert_session_time(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		at: DateTime<Utc>,
	) -> Result<(), StoreError> {
		let value = serde_json::to_value(at)?;
		self.upsert_state(conn, channel_id, StateField::SessionTime, Some(value))
			.await
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStateRepo;

#[derive(sqlx::FromRow)]
struct StateRow {
	current_material: Option<Json<CurrentMaterial>>,
	spotlighted_user: Option<Json<UserId>>,
	whiteboard_zoom_state: Option<Json<WhiteboardZoomState>>,
	recording: Option<Json<Recording>>,
	current_polling: Option<Json<CurrentPolling>>,
	session_time: Option<Json<DateTime<Utc>>>,
	stream_learner_counter: i64,
	streaming_learners: Json<Vec<UserId>>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl StateRow {
	fn into_state(self, channel_id: ChannelId) -> Result<LiveRoomState, StoreError> {
		let stream_learner_counter = u32::try_from(self.stream_learner_counter)
			.map_err(|e| StoreError::invalid_row("live_room_state", e))?;

		Ok(LiveRoomState {
			channel_id,
			current_material: self.current_material.map(|j| j.0),
			spotlighted_user: self.spotlighted_user.map(|j| j.0),
			whiteboard_zoom_state: self.whiteboard_zoom_state.map(|j| j.0),
			recording: self.recording.map(|j| j.0),
			current_polling: self.current_polling.map(|j| j.0),
			session_time: self.session_time.map(|j| j.0),
			stream_learner_counter,
			streaming_learners: self.streaming_learners.0,
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}

fn new_row_id() -> String {
	uuid::Uuid::new_v4().to_string()
}

#[async_trait::async_trait]
impl LiveRoomStateRepo for SqliteStateRepo {
	async fn get_state_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<LiveRoomState, StoreError> {
		let row: Option<StateRow> = sqlx::query_as(
			"SELECT current_material, spotlighted_user, whiteboard_zoom_state, recording, current_polling, \
			session_time, stream_learner_counter, streaming_learners, created_at, updated_at \
			FROM live_room_state WHERE channel_id = ? AND deleted_at IS NULL",
		)
		.bind(channel_id.as_str())
		.fetch_optional(&mut *conn)
		.await?;

		row.ok_or(StoreError::ChannelNotFound)?.into_state(channel_id.clone())
	}

	async fn upsert_state(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		field: StateField,
		value: Option<serde_json::Value>,
	) -> Result<(), StoreError> {
		let column = field.column();
		let sql = format!(
			"INSERT INTO live_room_state (live_room_state_id, channel_id, {column}, created_at, updated_at) \
			VALUES (?, ?, ?, ?, ?) \
			ON CONFLICT(channel_id) DO UPDATE SET {column} = excluded.{column}, \
			updated_at = excluded.updated_at, deleted_at = NULL"
		);
		let now = Utc::now();

		sqlx::query(&sql)
			.bind(new_row_id())
			.bind(channel_id.as_str())
			.bind(value.map(|v| v.to_string()))
			.bind(now)
			.bind(now)
			.execute(&mut *conn)
			.await?;

		debug!(channel_id = %channel_id, column, "live room state upserted");
		Ok(())
	}

	async fn get_streaming_learners(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		lock_for_update: bool,
	) -> Result<Vec<UserId>, StoreError> {
		// SQLite has no row locks; the enclosing write transaction serializes access.
		let row: Option<(Json<Vec<UserId>>,)> = sqlx::query_as(
			"SELECT streaming_learners FROM live_room_state WHERE channel_id = ? AND deleted_at IS NULL",
		)
		.bind(channel_id.as_str())
		.fetch_optional(&mut *conn)
		.await?;

		debug!(channel_id = %channel_id, lock_for_update, found = row.is_some(), "read streaming learners");
		row.map(|(learners,)| learners.0).ok_or(StoreError::ChannelNotFound)
	}

	async fn increase_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
		max: u32,
	) -> Result<(), StoreError> {
		// Guard and mutation are one statement. The first publisher creates the row.
		let result = sqlx::query(
			"INSERT INTO live_room_state \
			(live_room_state_id, channel_id, stream_learner_counter, streaming_learners, created_at, updated_at) \
			SELECT ?1, ?2, 1, json_array(?3), ?4, ?4 WHERE ?5 > 0 \
			ON CONFLICT(channel_id) DO UPDATE SET \
			stream_learner_counter = stream_learner_counter + 1, \
			streaming_learners = json_insert(streaming_learners, '$[#]', ?3), \
			updated_at = excluded.updated_at, deleted_at = NULL \
			WHERE stream_learner_counter < ?5 \
			AND NOT EXISTS (SELECT 1 FROM json_each(live_room_state.streaming_learners) WHERE json_each.value = ?3)",
		)
		.bind(new_row_id())
		.bind(channel_id.as_str())
		.bind(learner.as_str())
		.bind(Utc::now())
		.bind(i64::from(max))
		.execute(&mut *conn)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NoChannelUpdated);
		}
		Ok(())
	}

	async fn decrease_number_of_streaming(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
	) -> Result<(), StoreError> {
		let result = sqlx::query(
			"UPDATE live_room_state SET \
			stream_learner_counter = stream_learner_counter - 1, \
			streaming_learners = (SELECT json_group_array(json_each.value) \
				FROM json_each(live_room_state.streaming_learners) WHERE json_each.value <> ?1), \
			updated_at = ?2 \
			WHERE channel_id = ?3 AND deleted_at IS NULL AND stream_learner_counter > 0 \
			AND EXISTS (SELECT 1 FROM json_each(live_room_state.streaming_learners) WHERE json_each.value = ?1)",
		)
		.bind(learner.as_str())
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
