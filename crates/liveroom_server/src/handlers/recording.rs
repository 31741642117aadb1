#![forbid(unsafe_code)]

use liveroom_domain::{ChannelId, Recording, UserId};
use liveroom_store::{Conn, LiveRoomStateRepo};
use tracing::debug;

use super::{CommandHandler, load_state};
use crate::error::{CommandError, Denied, store_err};

async fn write_recording(
	state: &dyn LiveRoomStateRepo,
	conn: &mut Conn,
	channel_id: &ChannelId,
	recording: Option<&Recording>,
) -> Result<(), CommandError> {
	state
		.upsert_recording(conn, channel_id, recording)
		.await
		.map_err(store_err("state.upsert_recording"))
}

pub(super) struct RequestRecording<'a> {
	pub channel_id: &'a ChannelId,
	pub commander_id: &'a UserId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for RequestRecording<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let current = load_state(self.state, conn, self.channel_id)
			.await?
			.and_then(|s| s.recording);

		// A running recording keeps its creator.
		if let Some(running) = current.filter(|r| r.is_recording) {
			debug!(channel_id = %self.channel_id, creator = %running.creator, "recording already in progress");
			return Ok(());
		}

		let recording = Recording {
			is_recording: true,
			creator: self.commander_id.clone(),
		};
		write_recording(self.state, conn, self.channel_id, Some(&recording)).await
	}
}

pub(super) struct StopRecording<'a> {
	pub channel_id: &'a ChannelId,
	pub commander_id: &'a UserId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for StopRecording<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		let current = load_state(self.state, conn, self.channel_id)
			.await?
			.and_then(|s| s.recording);

		let creator = match current {
			Some(r) if &r.creator != self.commander_id => {
				return Err(CommandError::PermissionDenied(Denied::NotRecordingCreator));
			}
			Some(r) => r.creator,
			None => self.commander_id.clone(),
		};

		let recording = Recording {
			is_recording: false,
			creator,
		};
		write_recording(self.state, conn, self.channel_id, Some(&recording)).await
	}
}

pub(super) struct ResetRecording<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for ResetRecording<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		write_recording(self.state, conn, self.channel_id, None).await
	}
}
