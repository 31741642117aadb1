#![forbid(unsafe_code)]

use chrono::Utc;
use liveroom_domain::{ChannelId, UserId, WhiteboardZoomState};
use liveroom_store::{Conn, LiveRoomStateRepo};

use super::CommandHandler;
use crate::error::{CommandError, store_err};

pub(super) struct Spotlight<'a> {
	pub channel_id: &'a ChannelId,
	pub user_id: &'a UserId,
	pub is_enabled: bool,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for Spotlight<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		if self.is_enabled {
			self.state
				.spotlight(conn, self.channel_id, self.user_id)
				.await
				.map_err(store_err("state.spotlight"))
		} else {
			self.state
				.un_spotlight(conn, self.channel_id)
				.await
				.map_err(store_err("state.un_spotlight"))
		}
	}
}

pub(super) struct UpdateWhiteboardZoom<'a> {
	pub channel_id: &'a ChannelId,
	pub zoom: &'a WhiteboardZoomState,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for UpdateWhiteboardZoom<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		self.zoom.validate()?;
		self.state
			.upsert_whiteboard_zoom_state(conn, self.channel_id, self.zoom)
			.await
			.map_err(store_err("state.upsert_whiteboard_zoom_state"))
	}
}

pub(super) struct UpsertSessionTime<'a> {
	pub channel_id: &'a ChannelId,
	pub state: &'a dyn LiveRoomStateRepo,
}

#[async_trait::async_trait]
impl CommandHandler for UpsertSessionTime<'_> {
	async fn execute(&self, conn: &mut Conn) -> Result<(), CommandError> {
		self.state
			.upsert_session_time(conn, self.channel_id, Utc::now())
			.await
			.map_err(store_err("state.upsert_session_time"))
	}
}
