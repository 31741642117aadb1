#![forbid(unsafe_code)]

use liveroom_domain::{ChannelId, MemberStateType, StateValue, UserId};
use liveroom_store::{Conn, LiveRoomMemberStateRepo};
use tracing::debug;

use super::CommandHandler;
use crate::error::{CommandError, store_err};

/// Set a flag-type member state (hands-up, annotation, chat) for some users.
pub(super) struct UpdateMembers<'a> {
	pub channel_id: &'a ChannelId,
	pub user_ids: &'a [UserId],
	pub state_type: MemberStateType,
	pub value: bool,
	pub members: &'a dyn LiveRoomMemberStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for UpdateMembers<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		if self.user_ids.is_empty() {
			return Err(CommandError::InvalidArgument(format!(
				"{} update requires at least one user id",
				self.state_type
			)));
		}

		self.members
			.bulk_upsert(
				conn,
				self.channel_id,
				self.user_ids,
				self.state_type,
				&StateValue::flag(self.value),
			)
			.await
			.map_err(store_err("member_state.bulk_upsert"))
	}
}

/// Overwrite one member state type for everybody in the channel.
pub(super) struct UpdateAllMembers<'a> {
	pub channel_id: &'a ChannelId,
	pub state_type: MemberStateType,
	pub value: StateValue,
	pub members: &'a dyn LiveRoomMemberStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for UpdateAllMembers<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let updated = self
			.members
			.update_all(conn, self.channel_id, self.state_type, &self.value)
			.await
			.map_err(store_err("member_state.update_all"))?;

		debug!(channel_id = %self.channel_id, state_type = %self.state_type, updated, "member states updated");
		Ok(())
	}
}
