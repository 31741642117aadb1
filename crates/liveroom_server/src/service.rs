#![forbid(unsafe_code)]

//! Entry points above the dispatcher: joining and ending rooms, publish
//! admission, and read-only state queries.

use std::sync::Arc;

use chrono::Utc;
use liveroom_domain::{ActivityAction, ChannelId, LiveRoom, LiveRoomMemberState, LiveRoomPoll, LiveRoomState, UserId};
use liveroom_store::{Conn, LiveRoomStateRepo, LogCounter, StoreError};
use tracing::{debug, info, warn};

use crate::command::{Command, CommandAction};
use crate::dispatcher::Dispatcher;
use crate::error::{CommandError, db_err, store_err};
use crate::whiteboard::WhiteboardClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLiveRoomResponse {
	pub channel_id: ChannelId,
	pub whiteboard_room_id: String,
	pub whiteboard_token: String,
	pub is_student: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparePublishStatus {
	Prepared,
	/// The learner was already publishing; nothing changed.
	PreparedBefore,
	ReachedMaxUpstreamLimit,
}

impl PreparePublishStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			PreparePublishStatus::Prepared => "prepared",
			PreparePublishStatus::PreparedBefore => "prepared_before",
			PreparePublishStatus::ReachedMaxUpstreamLimit => "reached_max_upstream_limit",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpublishStatus {
	Unpublished,
	/// The learner was not publishing; nothing changed.
	UnpublishedBefore,
}

impl UnpublishStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			UnpublishStatus::Unpublished => "unpublished",
			UnpublishStatus::UnpublishedBefore => "unpublished_before",
		}
	}
}

/// Room state together with every member's flags.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveRoomSnapshot {
	pub state: LiveRoomState,
	pub member_states: Vec<LiveRoomMemberState>,
}

pub struct LiveRoomService {
	dispatcher: Arc<Dispatcher>,
	whiteboard: Arc<dyn WhiteboardClient>,
	maximum_learner_streamings: u32,
}

impl LiveRoomService {
	pub fn new(dispatcher: Arc<Dispatcher>, whiteboard: Arc<dyn WhiteboardClient>, maximum_learner_streamings: u32) -> Self {
		Self {
			dispatcher,
			whiteboard,
			maximum_learner_streamings,
		}
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	pub fn maximum_learner_streamings(&self) -> u32 {
		self.maximum_learner_streamings
	}

	/// Find the room by name, creating it and its whiteboard room on first use.
	pub async fn join_live_room(&self, channel_name: &str, user_id: &UserId) -> Result<JoinLiveRoomResponse, CommandError> {
		if channel_name.trim().is_empty() {
			return Err(CommandError::InvalidArgument("channel name must not be empty".to_string()));
		}

		self.dispatcher
			.with_deadline(async {
				let mut tx = self.dispatcher.begin().await?;
				let result = self.join_in(&mut *tx, channel_name, user_id).await;
				self.dispatcher.finish(tx, result).await
			})
			.await
	}

	/// Reset every shared state of the room, then mark it ended. Teachers only.
	pub async fn end_live_room(&self, channel_id: &ChannelId, commander_id: &UserId) -> Result<(), CommandError> {
		let reset = Command::new(commander_id.clone(), channel_id.clone(), CommandAction::ResetAllStates);

		self.dispatcher
			.with_deadline(async {
				let mut tx = self.dispatcher.begin().await?;
				let result = self.end_in(&mut *tx, &reset).await;
				self.dispatcher.finish(tx, result).await
			})
			.await
			.map_err(|e| e.in_operation("EndLiveRoom", channel_id))
	}

	/// Admit `learner` as a publisher unless the channel is full.
	pub async fn prepare_publish(&self, channel_id: &ChannelId, learner: &UserId) -> Result<PreparePublishStatus, CommandError> {
		let status = self
			.dispatcher
			.with_deadline(async {
				let mut tx = self.dispatcher.begin().await?;
				let result = self.prepare_publish_in(&mut *tx, channel_id, learner).await;
				self.dispatcher.finish(tx, result).await
			})
			.await
			.map_err(|e| e.in_operation("PreparePublish", channel_id))?;

		metrics::counter!("liveroom_publish_total", "status" => status.as_str()).increment(1);
		debug!(channel_id = %channel_id, learner = %learner, status = status.as_str(), "prepare publish");
		Ok(status)
	}

	pub async fn unpublish(&self, channel_id: &ChannelId, learner: &UserId) -> Result<UnpublishStatus, CommandError> {
		let status = self
			.dispatcher
			.with_deadline(async {
				let mut tx = self.dispatcher.begin().await?;
				let result = self.unpublish_in(&mut *tx, channel_id, learner).await;
				self.dispatcher.finish(tx, result).await
			})
			.await
			.map_err(|e| e.in_operation("Unpublish", channel_id))?;

		metrics::counter!("liveroom_unpublish_total", "status" => status.as_str()).increment(1);
		debug!(channel_id = %channel_id, learner = %learner, status = status.as_str(), "unpublish");
		Ok(status)
	}

	/// A channel without a state row reads as the empty state.
	pub async fn get_live_room_state(&self, channel_id: &ChannelId) -> Result<LiveRoomSnapshot, CommandError> {
		self.dispatcher
			.with_deadline(async {
				let mut conn = self.dispatcher.pool().acquire().await.map_err(db_err("pool.acquire"))?;
				let repos = self.dispatcher.repos();

				let state = match repos.state.get_state_by_channel_id(&mut *conn, channel_id).await {
					Ok(state) => state,
					Err(StoreError::ChannelNotFound) => LiveRoomState::empty(channel_id.clone(), Utc::now()),
					Err(e) => return Err(store_err("state.get_state_by_channel_id")(e)),
				};
				let member_states = repos
					.member_state
					.get_states_by_channel_id(&mut *conn, channel_id)
					.await
					.map_err(store_err("member_state.get_states_by_channel_id"))?;

				if let Err(e) = repos
					.live_room_log
					.increase_total_times_by_channel_id(&mut *conn, channel_id, LogCounter::GettingRoomState)
					.await
				{
					warn!(channel_id = %channel_id, error = %e, "session log not updated");
				}

				Ok::<_, CommandError>(LiveRoomSnapshot { state, member_states })
			})
			.await
			.map_err(|e| e.in_operation("GetLiveRoomState", channel_id))
	}

	pub async fn list_polls(&self, channel_id: &ChannelId) -> Result<Vec<LiveRoomPoll>, CommandError> {
		self.dispatcher
			.with_deadline(async {
				let mut conn = self.dispatcher.pool().acquire().await.map_err(db_err("pool.acquire"))?;
				self.dispatcher
					.repos()
					.poll
					.list_by_channel_id(&mut *conn, channel_id)
					.await
					.map_err(store_err("poll.list_by_channel_id"))
			})
			.await
			.map_err(|e| e.in_operation("ListPolls", channel_id))
	}

	async fn join_in(&self, conn: &mut Conn, channel_name: &str, user_id: &UserId) -> Result<JoinLiveRoomResponse, CommandError> {
		let repos = self.dispatcher.repos();

		let room = match repos.live_room.get_by_name(conn, channel_name).await {
			Ok(room) => room,
			Err(StoreError::ChannelNotFound) => self.create_room(conn, channel_name).await?,
			Err(e) => return Err(store_err("live_room.get_by_name")(e)),
		};

		let room = if room.has_whiteboard_room() {
			room
		} else {
			let whiteboard_room_id = self.whiteboard.create_room(channel_name).await?;
			repos
				.live_room
				.update_channel_room_id(conn, &room.channel_id, &whiteboard_room_id)
				.await
				.map_err(store_err("live_room.update_channel_room_id"))?;
			LiveRoom {
				whiteboard_room_id,
				..room
			}
		};

		let whiteboard_token = self.whiteboard.fetch_room_token(&room.whiteboard_room_id, user_id).await?;
		let is_student = self.dispatcher.checker().is_student(conn, user_id).await?;
		self.record_attendee(conn, &room.channel_id, user_id).await?;

		info!(channel_id = %room.channel_id, user_id = %user_id, is_student, "joined live room");
		Ok(JoinLiveRoomResponse {
			channel_id: room.channel_id,
			whiteboard_room_id: room.whiteboard_room_id,
			whiteboard_token,
			is_student,
		})
	}

	/// Join the open session log, or start a new one once the last has completed.
	async fn record_attendee(&self, conn: &mut Conn, channel_id: &ChannelId, user_id: &UserId) -> Result<(), CommandError> {
		let logs = self.dispatcher.repos().live_room_log.as_ref();

		match logs.get_latest_by_channel_id(conn, channel_id).await {
			Ok(log) if !log.is_completed => logs
				.add_attendee_id_by_channel_id(conn, channel_id, user_id)
				.await
				.map_err(store_err("live_room_log.add_attendee_id_by_channel_id")),
			Ok(_) | Err(StoreError::ChannelNotFound) => {
				let log = logs
					.create(conn, channel_id, std::slice::from_ref(user_id))
					.await
					.map_err(store_err("live_room_log.create"))?;
				debug!(channel_id = %channel_id, log_id = %log.log_id, "session log started");
				Ok(())
			}
			Err(e) => Err(store_err("live_room_log.get_latest_by_channel_id")(e)),
		}
	}

	async fn create_room(&self, conn: &mut Conn, channel_name: &str) -> Result<LiveRoom, CommandError> {
		let repos = self.dispatcher.repos();
		let whiteboard_room_id = self.whiteboard.create_room(channel_name).await?;
		let channel_id =
			ChannelId::new(uuid::Uuid::new_v4().to_string()).map_err(|e| CommandError::InvalidArgument(e.to_string()))?;

		match repos
			.live_room
			.create_live_room(conn, &channel_id, channel_name, &whiteboard_room_id)
			.await
		{
			Ok(room) => {
				info!(channel_id = %room.channel_id, channel_name, "live room created");
				Ok(room)
			}
			// Lost a race on the unique name; the winner's row is the room.
			Err(StoreError::NoChannelCreated) => repos
				.live_room
				.get_by_name(conn, channel_name)
				.await
				.map_err(store_err("live_room.get_by_name")),
			Err(e) => Err(store_err("live_room.create_live_room")(e)),
		}
	}

	async fn end_in(&self, conn: &mut Conn, reset: &Command) -> Result<(), CommandError> {
		self.dispatcher.checker().check(conn, reset).await?;

		let live_room = self.dispatcher.repos().live_room.as_ref();
		live_room
			.get_by_id(conn, &reset.channel_id)
			.await
			.map_err(store_err("live_room.get_by_id"))?;

		self.dispatcher.dispatch_with_transaction(conn, reset).await?;
		live_room
			.end_live_room(conn, &reset.channel_id, Utc::now())
			.await
			.map_err(store_err("live_room.end_live_room"))?;
		self.dispatcher
			.repos()
			.live_room_log
			.complete_log_by_channel_id(conn, &reset.channel_id)
			.await
			.map_err(store_err("live_room_log.complete_log_by_channel_id"))?;

		info!(channel_id = %reset.channel_id, commander_id = %reset.commander_id, "live room ended");
		Ok(())
	}

	async fn prepare_publish_in(
		&self,
		conn: &mut Conn,
		channel_id: &ChannelId,
		learner: &UserId,
	) -> Result<PreparePublishStatus, CommandError> {
		let repos = self.dispatcher.repos();

		if streaming_learners(repos.state.as_ref(), conn, channel_id, true).await?.contains(learner) {
			return Ok(PreparePublishStatus::PreparedBefore);
		}

		match repos
			.state
			.increase_number_of_streaming(conn, channel_id, learner, self.maximum_learner_streamings)
			.await
		{
			Ok(()) => {}
			Err(StoreError::NoChannelUpdated) => {
				// Either full or admitted by a concurrent request in between.
				let learners = streaming_learners(repos.state.as_ref(), conn, channel_id, false).await?;
				return Ok(if learners.contains(learner) {
					PreparePublishStatus::PreparedBefore
				} else {
					PreparePublishStatus::ReachedMaxUpstreamLimit
				});
			}
			Err(e) => return Err(store_err("state.increase_number_of_streaming")(e)),
		}

		repos
			.activity_log
			.create_log(conn, channel_id, learner, ActivityAction::Publish)
			.await
			.map_err(store_err("activity_log.create_log"))?;
		Ok(PreparePublishStatus::Prepared)
	}

	async fn unpublish_in(&self, conn: &mut Conn, channel_id: &ChannelId, learner: &UserId) -> Result<UnpublishStatus, CommandError> {
		let repos = self.dispatcher.repos();

		match repos.state.decrease_number_of_streaming(conn, channel_id, learner).await {
			Ok(()) => {}
			Err(StoreError::NoChannelUpdated) => return Ok(UnpublishStatus::UnpublishedBefore),
			Err(e) => return Err(store_err("state.decrease_number_of_streaming")(e)),
		}

		repos
			.activity_log
			.create_log(conn, channel_id, learner, ActivityAction::Unpublish)
			.await
			.map_err(store_err("activity_log.create_log"))?;
		Ok(UnpublishStatus::Unpublished)
	}
}

async fn streaming_learners(
	state: &dyn LiveRoomStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
	lock_for_update: bool,
) -> Result<Vec<UserId>, CommandError> {
	match state.get_streaming_learners(conn, channel_id, lock_for_update).await {
		Ok(learners) => Ok(learners),
		Err(StoreError::ChannelNotFound) => Ok(Vec::new()),
		Err(e) => Err(store_err("state.get_streaming_learners")(e)),
	}
}
