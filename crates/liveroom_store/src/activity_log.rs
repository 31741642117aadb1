#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use liveroom_domain::{ActivityAction, ChannelId, UserId};

use crate::{Conn, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
	pub activity_log_id: String,
	pub channel_id: ChannelId,
	pub user_id: UserId,
	pub action: ActivityAction,
	pub created_at: DateTime<Utc>,
}

/// Append-only log of publish/unpublish activity.
#[async_trait::async_trait]
pub trait LiveRoomActivityLogRepo: Send + Sync {
	async fn create_log(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_id: &UserId,
		action: ActivityAction,
	) -> Result<ActivityLog, StoreError>;

	async fn list_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<Vec<ActivityLog>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteActivityLogRepo;

#[async_trait::async_trait]
impl LiveRoomActivityLogRepo for SqliteActivityLogRepo {
	async fn create_log(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_id: &UserId,
		action: ActivityAction,
	) -> Result<ActivityLog, StoreError> {
		let log = ActivityLog {
			activity_log_id: uuid::Uuid::new_v4().to_string(),
			channel_id: channel_id.clone(),
			user_id: user_id.clone(),
			action,
			created_at: Utc::now(),
		};

		sqlx::query(
			"INSERT INTO live_room_activity_logs (activity_log_id, channel_id, user_id, action_type, created_at, updated_at) \
			VALUES (?, ?, ?, ?, ?, ?)",
		)
		.bind(&log.activity_log_id)
		.bind(log.channel_id.as_str())
		.bind(log.user_id.as_str())
		.bind(action.as_str())
		.bind(log.created_at)
		.bind(log.created_at)
		.execute(&mut *conn)
		.await?;

		Ok(log)
	}

	async fn list_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<Vec<ActivityLog>, StoreError> {
		let rows: Vec<(String, String, String, DateTime<Utc>)> = sqlx::query_as(
			"SELECT activity_log_id, user_id, action_type, created_at FROM live_room_activity_logs \
			WHERE channel_id = ? AND deleted_at IS NULL ORDER BY created_at ASC, rowid ASC",
		)
		.bind(channel_id.as_str())
		.fetch_all(&mut *conn)
		.await?;

		rows.into_iter()
			.map(|(activity_log_id, user_id, action_type, created_at)| {
				let action = match action_type.as_str() {
					"publish" => ActivityAction::Publish,
					"unpublish" => ActivityAction::Unpublish,
					other => {
						return Err(StoreError::invalid_row(
							"live_room_activity_logs",
							format!("unknown action_type {other:?}"),
						));
					}
				};
				Ok(ActivityLog {
					activity_log_id,
					channel_id: channel_id.clone(),
					user_id: UserId::new(user_id).map_err(|e| StoreError::invalid_row("live_room_activity_logs", e))?,
					action,
					created_at,
				})
			})
			.collect()
	}
}
