#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use liveroom_domain::{ChannelId, LiveRoomPoll, PollingOptions, StudentAnswer};
use sqlx::types::Json;

use crate::{Conn, StoreError};

#[async_trait::async_trait]
pub trait LiveRoomPollRepo: Send + Sync {
	async fn create_live_room_poll(&self, conn: &mut Conn, poll: &LiveRoomPoll) -> Result<(), StoreError>;

	/// Archived polls of a channel, oldest first.
	async fn list_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<Vec<LiveRoomPoll>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlitePollRepo;

#[derive(sqlx::FromRow)]
struct PollRow {
	poll_id: String,
	question: String,
	options: Json<PollingOptions>,
	students_answers: Json<Vec<StudentAnswer>>,
	stopped_at: Option<DateTime<Utc>>,
	ended_at: DateTime<Utc>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

#[async_trait::async_trait]
impl LiveRoomPollRepo for SqlitePollRepo {
	async fn create_live_room_poll(&self, conn: &mut Conn, poll: &LiveRoomPoll) -> Result<(), StoreError> {
		sqlx::query(
			"INSERT INTO live_room_poll \
			(poll_id, channel_id, question, options, students_answers, stopped_at, ended_at, created_at, updated_at) \
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
		)
		.bind(&poll.poll_id)
		.bind(poll.channel_id.as_str())
		.bind(&poll.question)
		.bind(serde_json::to_string(&poll.options)?)
		.bind(serde_json::to_string(&poll.students_answers)?)
		.bind(poll.stopped_at)
		.bind(poll.ended_at)
		.bind(poll.created_at)
		.bind(poll.updated_at)
		.execute(&mut *conn)
		.await?;

		Ok(())
	}

	async fn list_by_channel_id(&self, conn: &mut Conn, channel_id: &ChannelId) -> Result<Vec<LiveRoomPoll>, StoreError> {
		let rows: Vec<PollRow> = sqlx::query_as(
			"SELECT poll_id, question, options, students_answers, stopped_at, ended_at, created_at, updated_at \
			FROM live_room_poll WHERE channel_id = ? AND deleted_at IS NULL ORDER BY created_at ASC",
		)
		.bind(channel_id.as_str())
		.fetch_all(&mut *conn)
		.await?;

		Ok(rows
			.into_iter()
			.map(|row| LiveRoomPoll {
				poll_id: row.poll_id,
				channel_id: channel_id.clone(),
				options: row.options.0,
				question: row.question,
				students_answers: row.students_answers.0,
				created_at: row.created_at,
				stopped_at: row.stopped_at,
				ended_at: row.ended_at,
				updated_at: row.updated_at,
			})
			.collect())
	}
}
