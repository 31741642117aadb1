#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use liveroom_domain::{ChannelId, LiveRoomMemberState, MemberStateType, StateValue, UserId};
use sqlx::QueryBuilder;
use sqlx::types::Json;

use crate::{Conn, StoreError};

const TABLE: &str = "live_room_member_state";

/// Optional filters for [`LiveRoomMemberStateRepo::get_states_with_params`].
/// `None` means "do not filter on this column".
#[derive(Debug, Clone, Default)]
pub struct MemberStatesFilter {
	pub channel_id: Option<ChannelId>,
	pub user_ids: Option<Vec<UserId>>,
	pub state_type: Option<MemberStateType>,
}

impl MemberStatesFilter {
	pub fn channel(channel_id: ChannelId) -> Self {
		Self {
			channel_id: Some(channel_id),
			..Self::default()
		}
	}

	pub fn with_state_type(mut self, state_type: MemberStateType) -> Self {
		self.state_type = Some(state_type);
		self
	}

	pub fn with_users(mut self, user_ids: Vec<UserId>) -> Self {
		self.user_ids = Some(user_ids);
		self
	}
}

#[async_trait::async_trait]
pub trait LiveRoomMemberStateRepo: Send + Sync {
	async fn get_states_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
	) -> Result<Vec<LiveRoomMemberState>, StoreError>;

	async fn get_states_with_params(
		&self,
		conn: &mut Conn,
		filter: &MemberStatesFilter,
	) -> Result<Vec<LiveRoomMemberState>, StoreError>;

	/// Upsert one state type for many users at once. An empty `user_ids` is
	/// rejected before touching the database.
	async fn bulk_upsert(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_ids: &[UserId],
		state_type: MemberStateType,
		value: &StateValue,
	) -> Result<(), StoreError>;

	/// Overwrite `state_type` for every member of the channel that has a row.
	async fn update_all(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		state_type: MemberStateType,
		value: &StateValue,
	) -> Result<u64, StoreError>;

	async fn create_one(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_id: &UserId,
		state_type: MemberStateType,
		value: &StateValue,
	) -> Result<(), StoreError> {
		self.bulk_upsert(conn, channel_id, std::slice::from_ref(user_id), state_type, value)
			.await
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteMemberStateRepo;

#[derive(sqlx::FromRow)]
struct MemberStateRow {
	channel_id: String,
	user_id: String,
	state_type: String,
	bool_value: bool,
	string_array_value: Json<Vec<String>>,
	created_at: DateTime<Utc>,
	updated_at: DateTime<Utc>,
}

impl TryFrom<MemberStateRow> for LiveRoomMemberState {
	type Error = StoreError;

	fn try_from(row: MemberStateRow) -> Result<Self, Self::Error> {
		Ok(LiveRoomMemberState {
			channel_id: ChannelId::new(row.channel_id).map_err(|e| StoreError::invalid_row(TABLE, e))?,
			user_id: UserId::new(row.user_id).map_err(|e| StoreError::invalid_row(TABLE, e))?,
			state_type: row
				.state_type
				.parse()
				.map_err(|e| StoreError::invalid_row(TABLE, e))?,
			value: StateValue {
				bool_value: row.bool_value,
				string_array_value: row.string_array_value.0,
			},
			created_at: row.created_at,
			updated_at: row.updated_at,
		})
	}
}

const SELECT_COLUMNS: &str = "SELECT channel_id, user_id, state_type, bool_value, string_array_value, created_at, updated_at \
	FROM live_room_member_state WHERE deleted_at IS NULL";

#[async_trait::async_trait]
impl LiveRoomMemberStateRepo for SqliteMemberStateRepo {
	async fn get_states_by_channel_id(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
	) -> Result<Vec<LiveRoomMemberState>, StoreError> {
		self.get_states_with_params(conn, &MemberStatesFilter::channel(channel_id.clone()))
			.await
	}

	async fn get_states_with_params(
		&self,
		conn: &mut Conn,
		filter: &MemberStatesFilter,
	) -> Result<Vec<LiveRoomMemberState>, StoreError> {
		let mut qb = QueryBuilder::<sqlx::Sqlite>::new(SELECT_COLUMNS);

		if let Some(channel_id) = &filter.channel_id {
			qb.push(" AND channel_id = ").push_bind(channel_id.as_str().to_owned());
		}
		if let Some(user_ids) = &filter.user_ids {
			if user_ids.is_empty() {
				return Ok(Vec::new());
			}
			qb.push(" AND user_id IN (");
			let mut sep = qb.separated(", ");
			for user_id in user_ids {
				sep.push_bind(user_id.as_str().to_owned());
			}
			sep.push_unseparated(")");
		}
		if let Some(state_type) = filter.state_type {
			qb.push(" AND state_type = ").push_bind(state_type.as_str());
		}
		qb.push(" ORDER BY created_at ASC, user_id ASC");

		let rows: Vec<MemberStateRow> = qb.build_query_as().fetch_all(&mut *conn).await?;
		rows.into_iter().map(LiveRoomMemberState::try_from).collect()
	}

	async fn bulk_upsert(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		user_ids: &[UserId],
		state_type: MemberStateType,
		value: &StateValue,
	) -> Result<(), StoreError> {
		if user_ids.is_empty() {
			return Err(StoreError::InvalidArgument("user_ids must not be empty".to_string()));
		}

		let unique: BTreeSet<&str> = user_ids.iter().map(UserId::as_str).collect();
		let answers = serde_json::to_string(&value.string_array_value)?;
		let now = Utc::now();

		let mut qb = QueryBuilder::<sqlx::Sqlite>::new(
			"INSERT INTO live_room_member_state \
			(channel_id, user_id, state_type, bool_value, string_array_value, created_at, updated_at) ",
		);
		qb.push_values(unique, |mut row, user_id| {
			row.push_bind(channel_id.as_str().to_owned())
				.push_bind(user_id.to_owned())
				.push_bind(state_type.as_str())
				.push_bind(value.bool_value)
				.push_bind(answers.clone())
				.push_bind(now)
				.push_bind(now);
		});
		qb.push(
			" ON CONFLICT(channel_id, user_id, state_type) DO UPDATE SET \
			bool_value = excluded.bool_value, string_array_value = excluded.string_array_value, \
			updated_at = excluded.updated_at, deleted_at = NULL",
		);

		qb.build().execute(&mut *conn).await?;
		Ok(())
	}

	async fn update_all(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		state_type: MemberStateType,
		value: &StateValue,
	) -> Result<u64, StoreError> {
		let result = sqlx::query(
			"UPDATE live_room_member_state SET bool_value = ?, string_array_value = ?, updated_at = ?, deleted_at = NULL \
			WHERE channel_id = ? AND state_type = ?",
		)
		.bind(value.bool_value)
		.bind(serde_json::to_string(&value.string_array_value)?)
		.bind(Utc::now())
		.bind(channel_id.as_str())
		.bind(state_type.as_str())
		.execute(&mut *conn)
		.await?;

		Ok(result.rows_affected())
	}
}
