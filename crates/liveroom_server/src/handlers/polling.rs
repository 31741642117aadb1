#![forbid(unsafe_code)]

//! Polling lifecycle handlers.
//!
//! Each guard reads `current_polling` and writes the whole document back in a
//! separate statement. Two concurrent commands on the same channel can both pass
//! the guard before either writes; nothing here serializes them beyond the
//! database transaction.

use chrono::Utc;
use liveroom_domain::{
	ChannelId, CurrentPolling, MemberStateType, PollingError, PollingOptions, StateValue, StudentAnswer, UserId,
};
use liveroom_store::{Conn, LiveRoomMemberStateRepo, LiveRoomPollRepo, LiveRoomStateRepo, MemberStatesFilter};
use tracing::{debug, info};

use super::{CommandHandler, load_state};
use crate::error::{CommandError, store_err};

async fn current_polling(
	state: &dyn LiveRoomStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
) -> Result<Option<CurrentPolling>, CommandError> {
	Ok(load_state(state, conn, channel_id)
		.await?
		.and_then(|s| s.current_polling))
}

async fn write_polling(
	state: &dyn LiveRoomStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
	polling: Option<&CurrentPolling>,
) -> Result<(), CommandError> {
	state
		.upsert_current_polling(conn, channel_id, polling)
		.await
		.map_err(store_err("state.upsert_current_polling"))
}

async fn clear_answers(
	members: &dyn LiveRoomMemberStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
) -> Result<(), CommandError> {
	members
		.update_all(conn, channel_id, MemberStateType::PollingAnswer, &StateValue::cleared())
		.await
		.map_err(store_err("member_state.update_all"))?;
	Ok(())
}

pub(super) struct StartPolling<'a> {
	pub channel_id: &'a ChannelId,
	pub options: &'a PollingOptions,
	pub question: &'a str,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for StartPolling<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		self.options.validate()?;

		let existing = current_polling(self.state, conn, self.channel_id).await?;
		let polling = CurrentPolling::start(existing.as_ref(), self.options.clone(), self.question, Utc::now())?;
		write_polling(self.state, conn, self.channel_id, Some(&polling)).await?;

		info!(channel_id = %self.channel_id, options = polling.options.len(), "polling started");
		Ok(())
	}
}

pub(super) struct StopPolling<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for StopPolling<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let polling = current_polling(self.state, conn, self.channel_id)
			.await?
			.ok_or(PollingError::NotExists)?
			.stop(Utc::now())?;
		write_polling(self.state, conn, self.channel_id, Some(&polling)).await
	}
}

pub(super) struct SharePolling<'a> {
	pub channel_id: &'a ChannelId,
	pub is_shared: bool,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for SharePolling<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let polling = current_polling(self.state, conn, self.channel_id)
			.await?
			.ok_or(PollingError::NotExists)?
			.share(self.is_shared, Utc::now())?;
		write_polling(self.state, conn, self.channel_id, Some(&polling)).await
	}
}

pub(super) struct EndPolling<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
	pub members: &'a dyn LiveRoomMemberStateRepo,
	pub polls: &'a dyn LiveRoomPollRepo,
}

#[async_trait::async_trait]
impl CommandHandler for EndPolling<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let polling = current_polling(self.state, conn, self.channel_id)
			.await?
			.ok_or(PollingError::NotExists)?;

		let filter = MemberStatesFilter::channel(self.channel_id.clone()).with_state_type(MemberStateType::PollingAnswer);
		let answers = self
			.members
			.get_states_with_params(conn, &filter)
			.await
			.map_err(store_err("member_state.get_states_with_params"))?
			.into_iter()
			.map(|s| StudentAnswer {
				user_id: s.user_id,
				answers: s.value.string_array_value,
				updated_at: s.updated_at,
			})
			.collect();

		let poll_id = uuid::Uuid::new_v4().to_string();
		let archive = polling.end(poll_id, self.channel_id.clone(), answers, Utc::now())?;
		self.polls
			.create_live_room_poll(conn, &archive)
			.await
			.map_err(store_err("poll.create_live_room_poll"))?;

		write_polling(self.state, conn, self.channel_id, None).await?;
		clear_answers(self.members, conn, self.channel_id).await?;

		info!(
			channel_id = %self.channel_id,
			poll_id = %archive.poll_id,
			answers = archive.students_answers.len(),
			"polling ended"
		);
		Ok(())
	}
}

pub(super) struct SubmitPollingAnswer<'a> {
	pub channel_id: &'a ChannelId,
	pub user_id: &'a UserId,
	pub answers: &'a [String],
	pub state: &'a dyn LiveRoomStateRepo,
	pub members: &'a dyn LiveRoomMemberStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for SubmitPollingAnswer<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		if self.answers.is_empty() {
			return Err(PollingError::NoAnswers.into());
		}

		let polling = current_polling(self.state, conn, self.channel_id)
			.await?
			.ok_or(PollingError::NotExists)?;

		// Read-then-write: the one-answer rule is not backed by a constraint.
		let filter = MemberStatesFilter::channel(self.channel_id.clone())
			.with_users(vec![self.user_id.clone()])
			.with_state_type(MemberStateType::PollingAnswer);
		let previous = self
			.members
			.get_states_with_params(conn, &filter)
			.await
			.map_err(store_err("member_state.get_states_with_params"))?;
		let previous = previous.first().map(|s| s.value.string_array_value.as_slice());

		polling.check_submission(self.answers, previous)?;

		self.members
			.create_one(
				conn,
				self.channel_id,
				self.user_id,
				MemberStateType::PollingAnswer,
				&StateValue::answers(self.answers.to_vec()),
			)
			.await
			.map_err(store_err("member_state.create_one"))?;

		debug!(channel_id = %self.channel_id, user_id = %self.user_id, "polling answer submitted");
		Ok(())
	}
}

pub(super) struct ResetPolling<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
	pub members: &'a dyn LiveRoomMemberStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for ResetPolling<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		if current_polling(self.state, conn, self.channel_id).await?.is_none() {
			return Ok(());
		}

		write_polling(self.state, conn, self.channel_id, None).await?;
		clear_answers(self.members, conn, self.channel_id).await
	}
}
