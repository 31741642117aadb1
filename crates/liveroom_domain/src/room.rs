#![forbid(unsafe_code)]

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ChannelId, CurrentMaterial, CurrentPolling, UserId};

/// A live room (channel). Rows are never hard-deleted; a room is only ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveRoom {
	pub channel_id: ChannelId,
	pub channel_name: String,
	pub whiteboard_room_id: String,
	pub ended_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl LiveRoom {
	pub fn is_ended(&self) -> bool {
		self.ended_at.is_some()
	}

	pub fn has_whiteboard_room(&self) -> bool {
		!self.whiteboard_room_id.trim().is_empty()
	}
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ZoomStateError {
	#[error("pdf scale ratio must be positive, got {0}")]
	NonPositiveScale(f64),
	#[error("pdf size must be positive, got {width}x{height}")]
	NonPositiveSize { width: f64, height: f64 },
}

/// Whiteboard viewport transform shared by the room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardZoomState {
	pub pdf_scale_ratio: f64,
	pub center_x: f64,
	pub center_y: f64,
	pub pdf_width: f64,
	pub pdf_height: f64,
}

impl Default for WhiteboardZoomState {
	fn default() -> Self {
		Self {
			pdf_scale_ratio: 100.0,
			center_x: 0.0,
			center_y: 0.0,
			pdf_width: 1920.0,
			pdf_height: 1080.0,
		}
	}
}

impl WhiteboardZoomState {
	pub fn validate(&self) -> Result<(), ZoomStateError> {
		if !(self.pdf_scale_ratio > 0.0) {
			return Err(ZoomStateError::NonPositiveScale(self.pdf_scale_ratio));
		}
		if !(self.pdf_width > 0.0) || !(self.pdf_height > 0.0) {
			return Err(ZoomStateError::NonPositiveSize {
				width: self.pdf_width,
				height: self.pdf_height,
			});
		}
		Ok(())
	}
}

/// Recording descriptor: who started it and whether it is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
	pub is_recording: bool,
	pub creator: UserId,
}

/// Per-channel singleton state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRoomState {
	pub channel_id: ChannelId,
	pub current_material: Option<CurrentMaterial>,
	pub spotlighted_user: Option<UserId>,
	pub whiteboard_zoom_state: Option<WhiteboardZoomState>,
	pub recording: Option<Recording>,
	pub current_polling: Option<CurrentPolling>,
	pub session_time: Option<DateTime<Utc>>,
	pub stream_learner_counter: u32,
	pub streaming_learners: Vec<UserId>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl LiveRoomState {
	/// State of a channel that has no row yet.
	pub fn empty(channel_id: ChannelId, now: DateTime<Utc>) -> Self {
		Self {
			channel_id,
			current_material: None,
			spotlighted_user: None,
			whiteboard_zoom_state: None,
			recording: None,
			current_polling: None,
			session_time: None,
			stream_learner_counter: 0,
			streaming_learners: Vec::new(),
			created_at: now,
			updated_at: now,
		}
	}

	pub fn is_streaming(&self, learner: &UserId) -> bool {
		self.streaming_learners.iter().any(|l| l == learner)
	}
}

/// Append-only activity log entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
	Publish,
	Unpublish,
}

impl ActivityAction {
	pub const fn as_str(self) -> &'static str {
		match self {
			ActivityAction::Publish => "publish",
			ActivityAction::Unpublish => "unpublish",
		}
	}
}

impl fmt::Display for ActivityAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_zoom_state_is_valid() {
		assert_eq!(WhiteboardZoomState::default().validate(), Ok(()));
	}

	#[test]
	fn zoom_state_rejects_nan_and_zero() {
		let mut z = WhiteboardZoomState::default();
		z.pdf_scale_ratio = f64::NAN;
		assert!(matches!(z.validate(), Err(ZoomStateError::NonPositiveScale(_))));

		let z = WhiteboardZoomState {
			pdf_height: 0.0,
			..WhiteboardZoomState::default()
		};
		assert!(matches!(z.validate(), Err(ZoomStateError::NonPositiveSize { .. })));
	}

	#[test]
	fn whiteboard_room_presence() {
		let now = Utc::now();
		let mut room = LiveRoom {
			channel_id: ChannelId::new("ch").expect("id"),
			channel_name: "math".to_string(),
			whiteboard_room_id: "  ".to_string(),
			ended_at: None,
			created_at: now,
			updated_at: now,
		};
		assert!(!room.has_whiteboard_room());
		room.whiteboard_room_id = "wb-1".to_string();
		assert!(room.has_whiteboard_room());
	}
}
