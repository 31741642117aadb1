#![forbid(unsafe_code)]

//! Whiteboard rooms and access tokens.

use std::sync::atomic::{AtomicU64, Ordering};

use liveroom_domain::UserId;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WhiteboardError {
	#[error("room name must not be empty")]
	EmptyRoomName,
	#[error("room id must not be empty")]
	EmptyRoomId,
	#[error("whiteboard request failed: {0}")]
	Request(String),
}

#[async_trait::async_trait]
pub trait WhiteboardClient: Send + Sync {
	/// Create a room for `name` and return its id.
	async fn create_room(&self, name: &str) -> Result<String, WhiteboardError>;

	async fn fetch_room_token(&self, room_id: &str, user_id: &UserId) -> Result<String, WhiteboardError>;
}

/// In-process whiteboard. Keeps no per-room state: any non-empty room id gets
/// a token, including ids persisted by an earlier process.
#[derive(Debug, Default)]
pub struct LocalWhiteboard {
	rooms_created: AtomicU64,
}

impl LocalWhiteboard {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn rooms_created(&self) -> u64 {
		self.rooms_created.load(Ordering::Relaxed)
	}
}

#[async_trait::async_trait]
impl WhiteboardClient for LocalWhiteboard {
	async fn create_room(&self, name: &str) -> Result<String, WhiteboardError> {
		if name.trim().is_empty() {
			return Err(WhiteboardError::EmptyRoomName);
		}

		let room_id = uuid::Uuid::new_v4().simple().to_string();
		self.rooms_created.fetch_add(1, Ordering::Relaxed);
		debug!(name, room_id = %room_id, "whiteboard room created");
		Ok(room_id)
	}

	async fn fetch_room_token(&self, room_id: &str, user_id: &UserId) -> Result<String, WhiteboardError> {
		if room_id.trim().is_empty() {
			return Err(WhiteboardError::EmptyRoomId);
		}
		Ok(format!("{room_id}:{user_id}:{}", uuid::Uuid::new_v4().simple()))
	}
}
