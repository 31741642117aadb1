#![forbid(unsafe_code)]

use liveroom_domain::{ChannelId, CurrentMaterial};
use liveroom_store::{Conn, LiveRoomStateRepo};

use super::CommandHandler;
use crate::error::{CommandError, store_err};

pub(super) struct ShareMaterial<'a> {
	pub channel_id: &'a ChannelId,
	pub material: &'a CurrentMaterial,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for ShareMaterial<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		self.material.validate()?;
		self.state
			.upsert_current_material(conn, self.channel_id, Some(self.material))
			.await
			.map_err(store_err("state.upsert_current_material"))
	}
}

pub(super) struct StopSharingMaterial<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for StopSharingMaterial<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		self.state
			.upsert_current_material(conn, self.channel_id, None)
			.await
			.map_err(store_err("state.upsert_current_material"))
	}
}
